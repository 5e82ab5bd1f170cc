//! The session: clients, request dispatch, and the simulation thread.
//!
//! A session owns the scheduler, the state exchange, and the live
//! client set. Producer threads call [`Session::submit`] to wrap each
//! decoded request into exactly one scheduled task; one dedicated
//! simulation thread drains the scheduler and executes `process()`
//! calls strictly sequentially. That single-drainer rule is the whole
//! concurrency design: tasks mutate the world without per-field
//! locking, and everyone else reads through the exchange's published
//! snapshots.
//!
//! Task follow-ups (event delivery, motion-task rescheduling, clock
//! speed changes, disconnect teardown) are *returned* through the
//! [`TaskContext`] and performed by the drain loop after `process()`
//! returns, so no task ever reaches back into the queue that owns it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};
use trundle_core::error::{DispatchError, RequestError};
use trundle_core::event::SimEvent;
use trundle_core::id::{ClientId, IdSource, InterlockToken, TaskId};
use trundle_core::request::{Request, RequestPayload};
use trundle_core::time::SimTime;
use trundle_geom::{outlines_touch, Pose};
use trundle_model::{Body, FloorPlan, PaintBox, PartKind};

use crate::config::{ConfigError, EngineConfig};
use crate::exchange::{SceneView, StateExchange};
use crate::motion::{self, Outbox};
use crate::sched::Scheduler;
use crate::task::{
    Recurrence, Task, TaskEntry, PRIORITY_CLIENT, PRIORITY_HEARTBEAT, PRIORITY_MOTION,
};
use crate::world::World;

/// Per-client bookkeeping. The sender is the client's event channel;
/// dropping it (on disconnect) is the transport's signal to hang up.
struct ClientHandle {
    sender: Sender<SimEvent>,
    heartbeat_enabled: Arc<AtomicBool>,
    /// Bumped on every heartbeat (re-)enable; a heartbeat task whose
    /// generation is stale drops out, so rapid disable/enable cycles
    /// never accumulate duplicate tasks.
    heartbeat_generation: Arc<AtomicU64>,
    last_activity: Arc<Mutex<Instant>>,
    timeout_warned: Arc<AtomicBool>,
}

/// Execution context handed to [`Task::process`] on the simulation
/// thread.
///
/// Mutations of the world happen directly; everything that touches the
/// scheduler or leaves the simulation thread is *collected* here and
/// applied by the drain loop afterwards.
pub struct TaskContext<'a> {
    /// The mutable simulation state.
    pub world: &'a mut World,
    /// Session configuration.
    pub config: &'a EngineConfig,
    /// Committed simulated time at dispatch.
    pub sim_time: SimTime,
    /// The session's id generator.
    pub ids: &'a IdSource,
    clients: &'a Mutex<HashMap<ClientId, ClientHandle>>,
    out: Outbox,
    motion_wake: Option<SimTime>,
    disconnects: Vec<ClientId>,
    speed_change: Option<f64>,
    spawn: Vec<TaskEntry>,
}

impl TaskContext<'_> {
    /// Queue an event for delivery to `client` after this task returns.
    pub fn emit(&mut self, client: ClientId, event: SimEvent) {
        self.out.push((client, event));
    }

    /// Ask for the motion-evaluation task to run no later than `at`.
    pub fn wake_motion(&mut self, at: SimTime) {
        self.motion_wake = Some(self.motion_wake.map_or(at, |cur| cur.min(at)));
    }

    /// Tear down `client` after this task returns.
    pub fn request_disconnect(&mut self, client: ClientId) {
        self.disconnects.push(client);
    }

    /// Ask the session to change the clock speed after this task
    /// returns (clock controls stay with session-lifecycle code).
    pub fn request_speed(&mut self, factor: f64) {
        self.speed_change = Some(factor);
    }

    /// Schedule an additional task after this one returns.
    pub fn schedule(&mut self, entry: TaskEntry) {
        self.spawn.push(entry);
    }
}

// ── tasks ──────────────────────────────────────────────────────────

/// One decoded client request, dispatched as exactly one task.
struct RequestTask {
    client: ClientId,
    payload: RequestPayload,
}

impl Task for RequestTask {
    fn name(&self) -> &'static str {
        "request"
    }

    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Recurrence {
        let client = self.client;
        match std::mem::replace(&mut self.payload, RequestPayload::Stop) {
            RequestPayload::Place { prototype, pose } => handle_place(ctx, client, &prototype, pose),
            RequestPayload::Drive { left, right } => {
                let resolved = ctx
                    .world
                    .body_by_owner(client)
                    .ok_or(RequestError::NotPlaced)
                    .and_then(|b| motion::resolve_differential(b, left, right).map(|v| (b.id(), v)));
                match resolved {
                    Ok((body, v)) => {
                        let next =
                            motion::start_motion(ctx.world, body, v, ctx.sim_time.as_secs(), ctx.config, &mut ctx.out);
                        if let Some(at) = next {
                            ctx.wake_motion(at);
                        }
                    }
                    Err(err) => warn!(%client, %err, "drive request degraded to no-op"),
                }
            }
            RequestPayload::Steer {
                speed,
                steering_angle,
            } => {
                let resolved = ctx
                    .world
                    .body_by_owner(client)
                    .ok_or(RequestError::NotPlaced)
                    .and_then(|b| {
                        motion::resolve_ackerman(b, speed, steering_angle).map(|v| (b.id(), v))
                    });
                match resolved {
                    Ok((body, v)) => {
                        let next =
                            motion::start_motion(ctx.world, body, v, ctx.sim_time.as_secs(), ctx.config, &mut ctx.out);
                        if let Some(at) = next {
                            ctx.wake_motion(at);
                        }
                    }
                    Err(err) => warn!(%client, %err, "steer request degraded to no-op"),
                }
            }
            RequestPayload::Stop => {
                motion::halt_motion(ctx.world, client, ctx.sim_time.as_secs(), &mut ctx.out);
            }
            RequestPayload::QuerySensor { part } => {
                match motion::query_sensor(ctx.world, client, part, ctx.sim_time.as_secs()) {
                    Ok((body, value)) => {
                        ctx.emit(client, SimEvent::SensorChanged { body, part, value });
                    }
                    Err(err) => warn!(%client, %err, "sensor query degraded to no-op"),
                }
            }
            RequestPayload::SetHeartbeat { enabled } => handle_set_heartbeat(ctx, client, enabled),
            RequestPayload::SetSpeed { factor } => {
                if factor.is_finite() && factor > 0.0 {
                    ctx.request_speed(factor);
                } else {
                    warn!(%client, factor, "speed change degraded to no-op");
                }
            }
            RequestPayload::Disconnect => ctx.request_disconnect(client),
        }
        Recurrence::Done
    }
}

fn handle_place(ctx: &mut TaskContext<'_>, client: ClientId, prototype: &str, pose: Pose) {
    let rejected = |ctx: &mut TaskContext<'_>, err: RequestError| {
        warn!(%client, %err, "placement rejected");
        ctx.emit(
            client,
            SimEvent::PlacementResult {
                body: None,
                pose: None,
            },
        );
    };

    if ctx.world.body_by_owner(client).is_some() {
        return rejected(ctx, RequestError::AlreadyPlaced);
    }
    let plan = Arc::clone(&ctx.world.plan);
    let Some(proto) = plan.prototype(prototype) else {
        return rejected(
            ctx,
            RequestError::UnknownPrototype {
                name: prototype.to_string(),
            },
        );
    };
    if !plan.contains(pose.position) {
        return rejected(ctx, RequestError::InvalidPlacement);
    }

    let mut body = Body::from_prototype(
        ctx.ids.body_id(),
        client,
        proto,
        pose,
        ctx.sim_time.as_secs(),
    );
    let world_outline: Vec<_> = body
        .contact_outline()
        .iter()
        .map(|s| s.transformed(&pose))
        .collect();
    if outlines_touch(&world_outline, plan.walls()) {
        return rejected(ctx, RequestError::InvalidPlacement);
    }

    // A paint sensor gets its trail record at placement.
    let paint_part = body
        .parts()
        .iter()
        .position(|p| matches!(p.spec.kind, PartKind::PaintSensor { .. }));
    if let Some(index) = paint_part {
        let paint_id = ctx.ids.paint_box_id();
        ctx.world.paint.insert(
            paint_id,
            PaintBox::new(paint_id, body.id(), trundle_core::id::PartId(index as u32)),
        );
        body.set_paint_box(paint_id);
    }

    let id = body.id();
    ctx.world.bodies.insert(id, body);
    info!(%client, %id, prototype, "body placed");
    ctx.emit(
        client,
        SimEvent::PlacementResult {
            body: Some(id),
            pose: Some(pose),
        },
    );
}

fn handle_set_heartbeat(ctx: &mut TaskContext<'_>, client: ClientId, enabled: bool) {
    let clients = ctx.clients.lock().unwrap();
    let Some(handle) = clients.get(&client) else {
        debug!(%client, "heartbeat change for unknown client ignored");
        return;
    };
    handle.heartbeat_enabled.store(enabled, Ordering::Release);
    if !enabled {
        // The running heartbeat task sees the cleared flag at its next
        // recurrence and drops out of the queue.
        return;
    }
    let generation = handle.heartbeat_generation.fetch_add(1, Ordering::AcqRel) + 1;
    let entry = heartbeat_entry(
        ctx.ids.task_id(),
        client,
        handle,
        generation,
        ctx.sim_time + ctx.config.heartbeat_secs,
        ctx.config,
    );
    drop(clients);
    ctx.schedule(entry);
}

/// Conditional, self-recycling motion evaluation: recomputes the
/// minimum next due time across all bodies with in-progress motion and
/// drops out of the queue entirely when none remain.
struct MotionEvalTask;

impl Task for MotionEvalTask {
    fn name(&self) -> &'static str {
        "motion-eval"
    }

    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Recurrence {
        let next = motion::evaluate(
            ctx.world,
            ctx.sim_time.as_secs(),
            ctx.config,
            &mut ctx.out,
        );
        match next {
            Some(at) => Recurrence::At(at),
            None => Recurrence::Done,
        }
    }
}

/// Periodic, self-recycling per-client heartbeat, disabled by a flag
/// checked at each recurrence. Also watches for client inactivity.
struct HeartbeatTask {
    client: ClientId,
    generation: u64,
    enabled: Arc<AtomicBool>,
    generation_counter: Arc<AtomicU64>,
    last_activity: Arc<Mutex<Instant>>,
    timeout_warned: Arc<AtomicBool>,
    interval_secs: f64,
    idle_timeout_secs: f64,
}

impl Task for HeartbeatTask {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Recurrence {
        if !self.enabled.load(Ordering::Acquire)
            || self.generation_counter.load(Ordering::Acquire) != self.generation
        {
            return Recurrence::Done;
        }
        ctx.emit(
            self.client,
            SimEvent::Heartbeat {
                sim_time: ctx.sim_time,
            },
        );
        let idle_secs = self.last_activity.lock().unwrap().elapsed().as_secs_f64();
        if idle_secs > self.idle_timeout_secs && !self.timeout_warned.swap(true, Ordering::AcqRel)
        {
            ctx.emit(self.client, SimEvent::Timeout { idle_secs });
        }
        Recurrence::At(ctx.sim_time + self.interval_secs)
    }
}

fn heartbeat_entry(
    id: TaskId,
    client: ClientId,
    handle: &ClientHandle,
    generation: u64,
    due: SimTime,
    config: &EngineConfig,
) -> TaskEntry {
    TaskEntry::new(
        id,
        due,
        PRIORITY_HEARTBEAT,
        Some(client),
        Box::new(HeartbeatTask {
            client,
            generation,
            enabled: Arc::clone(&handle.heartbeat_enabled),
            generation_counter: Arc::clone(&handle.heartbeat_generation),
            last_activity: Arc::clone(&handle.last_activity),
            timeout_warned: Arc::clone(&handle.timeout_warned),
            interval_secs: config.heartbeat_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }),
    )
}

// ── session ────────────────────────────────────────────────────────

struct SessionShared {
    scheduler: Scheduler,
    exchange: StateExchange,
    clients: Mutex<HashMap<ClientId, ClientHandle>>,
    ids: IdSource,
    config: EngineConfig,
    /// Well-known id of the singleton motion-evaluation task.
    motion_task: TaskId,
}

impl SessionShared {
    fn send_event(&self, client: ClientId, event: SimEvent) {
        let clients = self.clients.lock().unwrap();
        match clients.get(&client) {
            Some(handle) => {
                if handle.sender.send(event).is_err() {
                    debug!(%client, "event dropped: receiver is gone");
                }
            }
            None => debug!(%client, "event dropped: client disconnected"),
        }
    }

    /// (Re-)schedule the motion-evaluation singleton to run no later
    /// than `at`. Remove-then-add keeps the membership invariant: the
    /// task is never added while still queued.
    fn schedule_motion_eval(&self, at: SimTime) {
        let due = match self.scheduler.remove(self.motion_task) {
            Some(existing) => existing.due.min(at),
            None => at,
        };
        let entry = TaskEntry::new(
            self.motion_task,
            due,
            PRIORITY_MOTION,
            None,
            Box::new(MotionEvalTask),
        );
        if self.scheduler.add(entry).is_err() {
            debug!("motion evaluation rescheduling rejected at shutdown");
        }
    }

    fn finalize_disconnect(&self, world: &mut World, client: ClientId) {
        let cancelled = self.scheduler.remove_by_originator(client);
        self.clients.lock().unwrap().remove(&client);
        let had_body = world.remove_body_of(client).is_some();
        info!(%client, cancelled, had_body, "client disconnected");
    }
}

/// A running simulation session.
///
/// Dropping the session closes the scheduler and joins the simulation
/// thread.
pub struct Session {
    shared: Arc<SessionShared>,
    sim_thread: Option<JoinHandle<()>>,
}

impl Session {
    /// Validate the configuration, take ownership of the loaded plan,
    /// and spawn the simulation thread. The clock starts stopped; call
    /// [`start_clock`](Self::start_clock) when the process is ready.
    pub fn new(plan: FloorPlan, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let ids = IdSource::new();
        let motion_task = ids.task_id();
        let shared = Arc::new(SessionShared {
            scheduler: Scheduler::new(config.speed),
            exchange: StateExchange::new(Duration::from_millis(config.min_frame_interval_ms)),
            clients: Mutex::new(HashMap::new()),
            ids,
            config,
            motion_task,
        });

        let world = World::new(Arc::new(plan));
        let thread_shared = Arc::clone(&shared);
        let sim_thread = std::thread::Builder::new()
            .name("trundle-sim".into())
            .spawn(move || run_loop(thread_shared, world))
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: e.to_string(),
            })?;

        Ok(Self {
            shared,
            sim_thread: Some(sim_thread),
        })
    }

    /// Register a client and hand back its event channel. A heartbeat
    /// task is scheduled immediately.
    pub fn connect(&self) -> (ClientId, Receiver<SimEvent>) {
        let client = self.shared.ids.client_id();
        let (sender, receiver) = unbounded();
        let handle = ClientHandle {
            sender,
            heartbeat_enabled: Arc::new(AtomicBool::new(true)),
            heartbeat_generation: Arc::new(AtomicU64::new(1)),
            last_activity: Arc::new(Mutex::new(Instant::now())),
            timeout_warned: Arc::new(AtomicBool::new(false)),
        };
        let entry = heartbeat_entry(
            self.shared.ids.task_id(),
            client,
            &handle,
            1,
            self.shared.scheduler.now() + self.shared.config.heartbeat_secs,
            &self.shared.config,
        );
        self.shared.clients.lock().unwrap().insert(client, handle);
        let _ = self.shared.scheduler.add(entry);
        info!(%client, "client connected");
        (client, receiver)
    }

    /// Wrap a decoded request into exactly one scheduled task. The
    /// dispatch time is the current simulated time plus the request's
    /// delay (zero delay dispatches immediately, clock running or not).
    /// Returns the task id, usable for cooperative cancellation.
    pub fn submit(&self, client: ClientId, request: Request) -> Result<TaskId, DispatchError> {
        if self.shared.scheduler.is_closed() {
            return Err(DispatchError::Shutdown);
        }
        {
            let clients = self.shared.clients.lock().unwrap();
            let handle = clients
                .get(&client)
                .ok_or(DispatchError::UnknownClient { client })?;
            *handle.last_activity.lock().unwrap() = Instant::now();
            handle.timeout_warned.store(false, Ordering::Release);
        }

        let due = if request.delay_secs > 0.0 {
            self.shared.scheduler.now() + request.delay_secs
        } else {
            SimTime::ZERO
        };
        let id = self.shared.ids.task_id();
        debug!(%client, %id, kind = request.payload.kind(), %due, "request scheduled");
        let entry = TaskEntry::new(
            id,
            due,
            PRIORITY_CLIENT,
            Some(client),
            Box::new(RequestTask {
                client,
                payload: request.payload,
            }),
        );
        self.shared
            .scheduler
            .add(entry)
            .map_err(|_| DispatchError::Shutdown)?;
        Ok(id)
    }

    /// Disconnect a client: its pending tasks are bulk-cancelled and
    /// its body destroyed, on the simulation thread. Paint trails stay.
    pub fn disconnect(&self, client: ClientId) -> Result<TaskId, DispatchError> {
        self.submit(client, Request::new(RequestPayload::Disconnect))
    }

    /// Cooperatively cancel a pending task. A task already executing
    /// cannot be interrupted; returns whether the task was still
    /// pending.
    pub fn cancel(&self, task: TaskId) -> bool {
        self.shared.scheduler.remove(task).is_some()
    }

    /// Start the simulated clock.
    pub fn start_clock(&self) {
        self.shared.scheduler.start_clock();
    }

    /// Stop the simulated clock, committing the estimate first.
    pub fn stop_clock(&self) {
        self.shared.scheduler.stop_clock();
    }

    /// Change the clock speed multiplier.
    pub fn set_speed(&self, factor: f64) -> bool {
        self.shared.scheduler.set_speed(factor)
    }

    /// Freeze simulated time; see [`Scheduler::open_interlock`].
    pub fn open_interlock(&self) -> InterlockToken {
        self.shared.scheduler.open_interlock()
    }

    /// Resume simulated time if `token` is current.
    pub fn close_interlock(&self, token: InterlockToken) -> bool {
        self.shared.scheduler.close_interlock(token)
    }

    /// The current committed simulated time.
    pub fn now(&self) -> SimTime {
        self.shared.scheduler.now()
    }

    /// The snapshot hand-off for render threads.
    pub fn exchange(&self) -> &StateExchange {
        &self.shared.exchange
    }

    /// Close the scheduler and join the simulation thread. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.sim_thread.take() {
            info!("session shutting down");
            self.shared.scheduler.close();
            let _ = handle.join();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The simulation thread: drain, execute, apply follow-ups, publish.
fn run_loop(shared: Arc<SessionShared>, mut world: World) {
    let mut scene = SceneView::default();
    while let Some(mut entry) = shared.scheduler.wait_for_next() {
        let sim_time = shared.scheduler.now();
        debug!(task = entry.task.name(), id = %entry.id, %sim_time, "dispatch");

        let mut ctx = TaskContext {
            world: &mut world,
            config: &shared.config,
            sim_time,
            ids: &shared.ids,
            clients: &shared.clients,
            out: Outbox::new(),
            motion_wake: None,
            disconnects: Vec::new(),
            speed_change: None,
            spawn: Vec::new(),
        };
        let recurrence = entry.task.process(&mut ctx);
        let TaskContext {
            out,
            motion_wake,
            disconnects,
            speed_change,
            spawn,
            ..
        } = ctx;

        for (client, event) in out {
            shared.send_event(client, event);
        }
        for spawned in spawn {
            let _ = shared.scheduler.add(spawned);
        }
        if let Some(factor) = speed_change {
            shared.scheduler.set_speed(factor);
        }
        if let Some(at) = motion_wake {
            shared.schedule_motion_eval(at);
        }
        match recurrence {
            Recurrence::At(due) => {
                entry.due = due;
                let _ = shared.scheduler.add(entry);
            }
            Recurrence::Done => {}
        }
        // Teardown last, so a disconnecting client's own recurring
        // tasks are re-queued first and swept with the rest.
        for client in disconnects {
            shared.finalize_disconnect(&mut world, client);
        }

        scene.capture_from(&world, shared.scheduler.now());
        shared.exchange.offer(&scene);
    }
    info!("simulation thread drained");
}
