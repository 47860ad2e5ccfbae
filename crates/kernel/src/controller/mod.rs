//! Controller: the command/reply protocol endpoint and sole tree mutator.
//!
//! This module turns the external command stream into kernel operations
//! while keeping the core's clock authoritative. It provides:
//! 1. **Dispatch:** Per-command handling inside a context that remembers correlation and batch ids.
//! 2. **Recovery:** Handler errors become `error` replies instead of crashing the kernel.
//! 3. **Pacing:** Each `process` call drains the inbound queue and hands the
//!    core one `(target_clock, wall_deadline)` window derived from the
//!    configured rate and scheduling interval.
//! 4. **Boundary:** Two bounded channels are the only state shared with the
//!    outside world; elements and events never cross them.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use serde_json::Value;
use tracing::{debug, warn};

use crate::circuit::{Circuit, ROOT};
use crate::common::{ElementId, KernelError, PortIndex, SimTime};
use crate::config::Config;
use crate::core::Core;
use crate::element::{Metadata, PortRef};
use crate::event::{Scheduled, SimEvent};
use crate::library::ComponentLibrary;

/// Command and reply message definitions.
pub mod protocol;

/// Component tree serialization and reconstruction.
pub mod serialize;

pub use protocol::{Command, Notice, Properties, PropertyPatch, Report, Request};

/// One scheduling window handed to the core.
#[derive(Clone, Copy, Debug)]
pub struct Pacing {
    /// Simulated time the core may advance to.
    pub target_clock: SimTime,
    /// Wall-clock instant at which the core must yield back.
    pub deadline: Instant,
    /// Cooperative stop flag, checked once per outer loop iteration.
    pub quit: bool,
}

/// Correlation state of the command currently being handled.
#[derive(Clone, Copy, Debug)]
struct CommandContext {
    request_id: u64,
    batch_id: Option<u64>,
}

/// The controller: sole writer of the component tree.
#[derive(Debug)]
pub struct Controller {
    circuit: Circuit,
    library: ComponentLibrary,
    config: Config,
    rate: f64,
    quit: bool,
    last_window: Option<Instant>,
    inbound: Receiver<Request>,
    outbound: Sender<Notice>,
}

/// Creates the bounded inbound/outbound channel pairs for one kernel.
///
/// Each channel has exactly one consumer: the controller drains the
/// inbound side, the external actor drains the outbound side.
pub fn channel_pair(
    config: &Config,
) -> (
    (Sender<Request>, Receiver<Request>),
    (Sender<Notice>, Receiver<Notice>),
) {
    (
        bounded(config.channel_capacity),
        bounded(config.channel_capacity),
    )
}

impl Controller {
    /// Creates a controller over an empty circuit.
    pub fn new(
        library: ComponentLibrary,
        config: Config,
        inbound: Receiver<Request>,
        outbound: Sender<Notice>,
    ) -> Self {
        let rate = config.rate;
        Self {
            circuit: Circuit::new(),
            library,
            config,
            rate,
            quit: false,
            last_window: None,
            inbound,
            outbound,
        }
    }

    /// Returns the component tree (the core delivers events through it).
    pub const fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    /// Returns the component tree read-only.
    pub const fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Drains the inbound command queue, posts `change` notifications for
    /// elements whose committed state changed during the previous window,
    /// then computes the next pacing window for the core.
    ///
    /// Sleeps off the remainder of the previous window when called back
    /// too soon, bounding CPU usage during idle periods. Draining fully is
    /// safe because the controller is the channel's only consumer.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ChannelClosed`] if the outbound channel was
    /// dropped by the external actor.
    pub fn process(&mut self, core: &mut Core) -> Result<Pacing, KernelError> {
        let interval = Duration::from_millis(self.config.scheduling_interval_ms);
        if let Some(last) = self.last_window {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_window = Some(Instant::now());

        loop {
            match self.inbound.try_recv() {
                Ok(request) => self.handle_request(core, request, None)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // Command side gone: nothing can ever drive us again.
                    self.quit = true;
                    break;
                }
            }
        }

        // Simulation-driven state changes are reported unsolicited, with
        // no correlation id. Deletes handled above may have retired some
        // of the recorded ids.
        for id in self.circuit.take_dirty() {
            if !self.circuit.contains(id) {
                continue;
            }
            let data = Value::Object(self.circuit.describe(id)?);
            self.try_post(core, Report::Change { data })?;
        }

        self.try_post(core, Report::Alive)?;

        let window = (self.rate * interval.as_secs_f64()).max(1.0) as u64;
        Ok(Pacing {
            target_clock: core.clock().after(window),
            deadline: Instant::now() + interval,
            quit: self.quit,
        })
    }

    /// Handles one command inside its per-command context.
    ///
    /// Errors raised by the handler are logged and reported back as
    /// `error` replies; the `fail_fast` diagnostic flag turns them into
    /// panics instead.
    fn handle_request(
        &mut self,
        core: &mut Core,
        request: Request,
        batch_id: Option<u64>,
    ) -> Result<(), KernelError> {
        let ctx = CommandContext {
            request_id: request.request_id,
            batch_id,
        };
        core.stats_mut().commands_processed += 1;
        debug!(request_id = ctx.request_id, command = ?request.command, "handling command");

        match self.dispatch(core, request.command, ctx) {
            Ok(()) => Ok(()),
            Err(KernelError::ChannelClosed) => Err(KernelError::ChannelClosed),
            Err(error) => {
                assert!(
                    !self.config.fail_fast,
                    "command {} failed: {error}",
                    ctx.request_id
                );
                warn!(request_id = ctx.request_id, %error, "command failed");
                self.post(
                    core,
                    Some(ctx.request_id),
                    ctx.batch_id,
                    Report::Error {
                        message: error.to_string(),
                        exception: format!("{error:?}"),
                    },
                )
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn dispatch(
        &mut self,
        core: &mut Core,
        command: Command,
        ctx: CommandContext,
    ) -> Result<(), KernelError> {
        match command {
            Command::Create {
                guid,
                id,
                parent,
                metadata,
            } => self.handle_create(core, &guid, id, parent, metadata.as_ref(), ctx),
            Command::Update { id, metadata } => self.handle_update(core, id, &metadata, ctx),
            Command::Delete { id } => self.handle_delete(core, id, ctx),
            Command::Connect {
                source_id,
                source_port,
                sink_id,
                sink_port,
                delay,
            } => {
                let resync = self.circuit.connect(
                    PortRef::new(ElementId::new(source_id), PortIndex::new(source_port)),
                    PortRef::new(ElementId::new(sink_id), PortIndex::new(sink_port)),
                    delay,
                    core.clock(),
                )?;
                for event in resync {
                    core.schedule(event);
                }
                self.post_change(core, ElementId::new(source_id), ctx)
            }
            Command::Disconnect {
                source_id,
                source_port,
            } => {
                self.circuit.disconnect(PortRef::new(
                    ElementId::new(source_id),
                    PortIndex::new(source_port),
                ))?;
                self.post_change(core, ElementId::new(source_id), ctx)
            }
            Command::Edge {
                id,
                input,
                state,
                delay,
            } => {
                let target = self
                    .circuit
                    .resolve_input(PortRef::new(ElementId::new(id), PortIndex::new(input)))?;
                core.schedule(Scheduled::at(
                    core.clock().after(delay),
                    SimEvent::Edge {
                        element: target.element,
                        input: target.port,
                        state,
                    },
                ));
                self.post_change(core, ElementId::new(id), ctx)
            }
            Command::Query { id } => self.post_change(core, ElementId::new(id), ctx),
            Command::Serialize { ids } => {
                let ids: Option<Vec<ElementId>> =
                    ids.map(|list| list.into_iter().map(ElementId::new).collect());
                let data = serialize::serialize(&self.circuit, ids.as_deref())?;
                self.post(
                    core,
                    Some(ctx.request_id),
                    ctx.batch_id,
                    Report::Serialization { data },
                )
            }
            Command::Deserialize { data } => {
                self.post(
                    core,
                    Some(ctx.request_id),
                    ctx.batch_id,
                    Report::DeserializationStart,
                )?;
                let created =
                    serialize::deserialize(&mut self.circuit, &mut self.library, core, &data)?;
                for id in &created {
                    self.post_change(core, *id, ctx)?;
                }
                self.post(
                    core,
                    Some(ctx.request_id),
                    ctx.batch_id,
                    Report::DeserializationEnd {
                        ids: created.iter().map(|id| id.val()).collect(),
                    },
                )
            }
            Command::Batch { commands } => self.handle_batch(core, commands, ctx),
            Command::SetSimulationProperties { properties } => {
                if let Some(rate) = properties.rate {
                    if !rate.is_finite() || rate <= 0.0 {
                        return Err(KernelError::MalformedCommand {
                            reason: format!("rate must be positive and finite, got {rate}"),
                        });
                    }
                    self.rate = rate;
                }
                self.post_properties(core, ctx)
            }
            Command::QuerySimulationProperties => self.post_properties(core, ctx),
            Command::EnumerateComponents => {
                let data: Vec<Value> = self
                    .library
                    .enumerate()
                    .into_iter()
                    .map(|(guid, defaults)| {
                        serde_json::json!([guid.as_str(), Value::Object(defaults)])
                    })
                    .collect();
                self.post(
                    core,
                    Some(ctx.request_id),
                    ctx.batch_id,
                    Report::EnumerateComponents {
                        data: Value::Array(data),
                    },
                )
            }
            Command::Quit => {
                self.quit = true;
                Ok(())
            }
        }
    }

    fn handle_create(
        &mut self,
        core: &mut Core,
        guid: &str,
        id: Option<u64>,
        parent: Option<u64>,
        metadata: Option<&Metadata>,
        ctx: CommandContext,
    ) -> Result<(), KernelError> {
        let parent = parent.map_or(ROOT, ElementId::new);
        if parent != ROOT && !self.circuit.contains(parent) {
            return Err(KernelError::UnknownElement { id: parent });
        }
        let proposed = id.map(ElementId::new);
        if let Some(proposed) = proposed {
            if self.circuit.contains(proposed) {
                return Err(KernelError::DuplicateElement { id: proposed });
            }
        }
        let empty = Metadata::new();
        let elements = self.library.instantiate(
            &crate::common::Guid::new(guid),
            proposed,
            parent,
            metadata.unwrap_or(&empty),
        )?;
        let principal = elements
            .first()
            .map(|e| e.id())
            .ok_or_else(|| KernelError::MalformedCommand {
                reason: format!("factory for {guid} produced no elements"),
            })?;
        self.circuit.insert(elements)?;
        self.post_change(core, principal, ctx)
    }

    fn handle_update(
        &mut self,
        core: &mut Core,
        id: u64,
        metadata: &Metadata,
        ctx: CommandContext,
    ) -> Result<(), KernelError> {
        let id = ElementId::new(id);

        // Typed handling for the keys the kernel interprets; the rest is
        // pass-through side metadata.
        let mut side = metadata.clone();
        let compound_inputs = side.remove("compound-inputs");
        let compound_outputs = side.remove("compound-outputs");
        let delay = side.remove("delay").and_then(|v| v.as_u64());

        for (key, input_side) in [(compound_inputs, true), (compound_outputs, false)] {
            let Some(entries) = key else { continue };
            let entries: Vec<(usize, u64, usize)> = serde_json::from_value(entries)?;
            for (port, inner, inner_port) in entries {
                let target = PortRef::new(ElementId::new(inner), PortIndex::new(inner_port));
                if input_side {
                    self.circuit
                        .map_compound_input(id, PortIndex::new(port), target)?;
                } else {
                    self.circuit
                        .map_compound_output(id, PortIndex::new(port), target)?;
                }
            }
        }

        let element = self.circuit.get_mut(id)?;
        if let Some(delay) = delay {
            if let Some(simple) = element.as_simple_mut() {
                simple.set_delay(delay);
            }
        }
        element.merge_metadata(&side);
        self.post_change(core, id, ctx)
    }

    fn handle_delete(
        &mut self,
        core: &mut Core,
        id: u64,
        ctx: CommandContext,
    ) -> Result<(), KernelError> {
        let removed = self.circuit.destroy(ElementId::new(id))?;
        for victim in removed {
            let mut data = Metadata::new();
            let _ = data.insert("id".into(), serde_json::json!(victim.val()));
            let _ = data.insert("deleted".into(), Value::Bool(true));
            self.post(
                core,
                Some(ctx.request_id),
                ctx.batch_id,
                Report::Change {
                    data: Value::Object(data),
                },
            )?;
        }
        Ok(())
    }

    fn handle_batch(
        &mut self,
        core: &mut Core,
        commands: Vec<Request>,
        ctx: CommandContext,
    ) -> Result<(), KernelError> {
        if ctx.batch_id.is_some() {
            return Err(KernelError::NestedBatch);
        }
        self.post(core, Some(ctx.request_id), None, Report::BatchStart)?;
        for nested in commands {
            // A nested batch is rejected by dispatch; the error reply is
            // posted against the nested request id and execution of the
            // remaining bracket members continues.
            self.handle_request(core, nested, Some(ctx.request_id))?;
        }
        self.post(core, Some(ctx.request_id), None, Report::BatchEnd)
    }

    fn post_properties(&mut self, core: &mut Core, ctx: CommandContext) -> Result<(), KernelError> {
        let properties = Properties {
            rate: self.rate,
            clock: core.clock().val(),
            retired_events: core.stats().retired_events,
        };
        self.post(
            core,
            Some(ctx.request_id),
            ctx.batch_id,
            Report::SimulationProperties { properties },
        )
    }

    /// Posts a `change` notification with the element's re-derived metadata.
    fn post_change(
        &mut self,
        core: &mut Core,
        id: ElementId,
        ctx: CommandContext,
    ) -> Result<(), KernelError> {
        let data = Value::Object(self.circuit.describe(id)?);
        self.post(
            core,
            Some(ctx.request_id),
            ctx.batch_id,
            Report::Change { data },
        )
    }

    fn post(
        &mut self,
        core: &mut Core,
        in_reply_to: Option<u64>,
        batch_id: Option<u64>,
        report: Report,
    ) -> Result<(), KernelError> {
        core.stats_mut().reports_posted += 1;
        self.outbound
            .send(Notice {
                clock: core.clock().val(),
                in_reply_to,
                batch_id,
                report,
            })
            .map_err(|_| KernelError::ChannelClosed)
    }

    /// Posts an uncorrelated notification without blocking.
    ///
    /// A full outbound channel drops the notification instead of wedging
    /// the kernel behind a stalled consumer; correlated replies keep the
    /// blocking [`Controller::post`] path.
    fn try_post(&mut self, core: &mut Core, report: Report) -> Result<(), KernelError> {
        let notice = Notice {
            clock: core.clock().val(),
            in_reply_to: None,
            batch_id: None,
            report,
        };
        match self.outbound.try_send(notice) {
            Ok(()) => {
                core.stats_mut().reports_posted += 1;
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                core.stats_mut().reports_dropped += 1;
                debug!("outbound channel full, dropping notification");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(KernelError::ChannelClosed),
        }
    }
}
