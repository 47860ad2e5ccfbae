use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use serde_json::Value;

use logicsim_core::controller::{self, Command, Notice, Report, Request};
use logicsim_core::{ComponentLibrary, Config, Controller, Core};

/// A kernel running on its own thread, addressed through its channels.
pub struct KernelHandle {
    commands: Sender<Request>,
    pub notices: Receiver<Notice>,
    worker: Option<thread::JoinHandle<()>>,
    next_id: u64,
}

impl KernelHandle {
    /// Spawns a kernel tuned for tests: short scheduling interval, high
    /// rate, so simulated time outruns the assertions.
    pub fn spawn() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let config = Config {
            rate: 1_000_000.0,
            scheduling_interval_ms: 1,
            ..Config::default()
        };
        let ((command_tx, command_rx), (notice_tx, notice_rx)) = controller::channel_pair(&config);
        let worker = thread::spawn(move || {
            let mut controller = Controller::new(
                ComponentLibrary::with_builtins(),
                config,
                command_rx,
                notice_tx,
            );
            let mut core = Core::new();
            core.run(&mut controller).expect("kernel loop");
        });
        Self {
            commands: command_tx,
            notices: notice_rx,
            worker: Some(worker),
            next_id: 1,
        }
    }

    /// Sends a command, returning its correlation id.
    pub fn send(&mut self, command: Command) -> u64 {
        let request_id = self.next_id;
        self.next_id += 1;
        self.commands
            .send(Request {
                request_id,
                command,
            })
            .expect("send command");
        request_id
    }

    /// Sends a raw JSON command object (the `request-id` is filled in).
    pub fn send_json(&mut self, mut value: Value) -> u64 {
        let request_id = self.next_id;
        self.next_id += 1;
        let _ = value
            .as_object_mut()
            .expect("command object")
            .insert("request-id".into(), Value::from(request_id));
        let request: Request = serde_json::from_value(value).expect("command shape");
        self.commands.send(request).expect("send command");
        request_id
    }

    /// Waits for the first non-`alive` reply correlated to `request_id`.
    pub fn wait_for(&self, request_id: u64) -> Notice {
        loop {
            let notice = self
                .notices
                .recv_timeout(Duration::from_secs(5))
                .expect("reply within timeout");
            if matches!(notice.report, Report::Alive) {
                continue;
            }
            if notice.in_reply_to == Some(request_id) {
                return notice;
            }
        }
    }

    /// Collects `count` non-`alive` replies correlated to `request_id`.
    pub fn wait_for_all(&self, request_id: u64, count: usize) -> Vec<Notice> {
        (0..count).map(|_| self.wait_for(request_id)).collect()
    }

    /// Waits for an uncorrelated `change` notice carrying the given
    /// element id, as posted when simulation flips an element's state.
    pub fn wait_for_unsolicited_change(&self, id: u64) -> Value {
        loop {
            let notice = self
                .notices
                .recv_timeout(Duration::from_secs(5))
                .expect("change within timeout");
            if notice.in_reply_to.is_some() {
                continue;
            }
            if let Report::Change { data } = notice.report {
                if data.get("id").and_then(Value::as_u64) == Some(id) {
                    return data;
                }
            }
        }
    }

    /// Sends `quit` and joins the kernel thread.
    pub fn shutdown(mut self) {
        let _ = self.send(Command::Quit);
        if let Some(worker) = self.worker.take() {
            worker.join().expect("kernel thread");
        }
    }
}

impl Drop for KernelHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.commands.send(Request {
                request_id: u64::MAX,
                command: Command::Quit,
            });
            let _ = worker.join();
        }
    }
}
