use crate::barrier::CompletionBarrier;
use crate::config::ServerConfig;
use crate::coordinator::{LotteryCoordinator, RoundReport};
use crate::draw::DrawRule;
use crate::registry::ConnectionRegistry;
use crate::session::SessionHandler;
use lotto_core::protocol::read_handshake;
use lotto_core::{BetStore, LotteryError, Result};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Pause between polls of the non-blocking listener.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Stops a running [`LotteryServer`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    barrier: Arc<CompletionBarrier>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.barrier.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

pub struct LotteryServer {
    listener: TcpListener,
    config: ServerConfig,
    store: Arc<dyn BetStore>,
    rule: Arc<dyn DrawRule>,
    registry: Arc<ConnectionRegistry<TcpStream>>,
    barrier: Arc<CompletionBarrier>,
    running: Arc<AtomicBool>,
}

impl LotteryServer {
    /// Bind to `0.0.0.0:<port>` from the configuration.
    pub fn bind(
        config: ServerConfig,
        store: Arc<dyn BetStore>,
        rule: Arc<dyn DrawRule>,
    ) -> Result<Self> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr).map_err(|e| {
            LotteryError::internal(format!("Failed to bind to {}: {}", addr, e))
        })?;
        Self::new(listener, config, store, rule)
    }

    /// Serve on an already bound listener.
    pub fn new(
        listener: TcpListener,
        config: ServerConfig,
        store: Arc<dyn BetStore>,
        rule: Arc<dyn DrawRule>,
    ) -> Result<Self> {
        config.validate()?;

        let barrier = Arc::new(CompletionBarrier::new(config.expected_agencies));
        Ok(Self {
            listener,
            config,
            store,
            rule,
            registry: Arc::new(ConnectionRegistry::new()),
            barrier,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: Arc::clone(&self.running),
            barrier: Arc::clone(&self.barrier),
        }
    }

    /// Accept agencies and run the configured number of rounds. Returns the
    /// report of every round that reached the draw.
    pub fn run(self) -> Result<Vec<RoundReport>> {
        self.listener.set_nonblocking(true)?;
        tracing::info!(
            "Listening on {} for {} agencies",
            self.local_addr()?,
            self.config.expected_agencies
        );

        let coordinator_handle = self.spawn_coordinator()?;
        let handler = SessionHandler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.barrier),
            self.config.max_batch_bytes,
        );

        let accept_result = self.accept_loop(&handler);

        // make sure the coordinator is not left waiting on a dead listener
        if accept_result.is_err() {
            self.shutdown_handle().shutdown();
        }

        let reports = coordinator_handle
            .join()
            .map_err(|_| LotteryError::internal("Coordinator thread panicked"))?;

        accept_result?;
        tracing::info!("Server stopped after {} rounds", reports.len());
        Ok(reports)
    }

    fn accept_loop(&self, handler: &SessionHandler) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    tracing::info!("Accepted connection from {}", addr);
                    self.spawn_session(stream, addr, handler.clone());
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e)
                    if matches!(
                        e.kind(),
                        ErrorKind::Interrupted | ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("Transient accept error: {}", e);
                }
                Err(e) => {
                    tracing::error!("Accept failed: {}", e);
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr, handler: SessionHandler) {
        let registry = Arc::clone(&self.registry);

        let spawned = thread::Builder::new()
            .name("agency-session".to_string())
            .spawn(move || {
                if let Err(e) = serve_agency(stream, &handler, &registry) {
                    tracing::error!("Session with {} ended: {}", addr, e);
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn session thread for {}: {}", addr, e);
        }
    }

    fn spawn_coordinator(&self) -> Result<thread::JoinHandle<Vec<RoundReport>>> {
        let coordinator = LotteryCoordinator::new(
            Arc::clone(&self.store),
            Arc::clone(&self.rule),
            Arc::clone(&self.registry),
            Arc::clone(&self.barrier),
        )?;
        let shutdown = self.shutdown_handle();
        let rounds = self.config.rounds;
        let timeout = self.config.round_timeout();

        let handle = thread::Builder::new()
            .name("lottery-coordinator".to_string())
            .spawn(move || {
                let mut reports = Vec::new();
                let mut attempted = 0u32;

                while shutdown.is_running() {
                    attempted += 1;
                    match coordinator.run_round(timeout) {
                        Ok(Some(report)) => reports.push(report),
                        Ok(None) => break,
                        Err(e) => tracing::error!("Round {} failed: {}", attempted, e),
                    }

                    if rounds != 0 && attempted >= rounds {
                        break;
                    }
                }

                shutdown.running.store(false, Ordering::SeqCst);
                reports
            })
            .map_err(|e| {
                LotteryError::internal(format!("Failed to spawn coordinator thread: {}", e))
            })?;

        Ok(handle)
    }
}

/// Handshake, register and run the batch loop for one agency connection.
fn serve_agency(
    mut stream: TcpStream,
    handler: &SessionHandler,
    registry: &ConnectionRegistry<TcpStream>,
) -> Result<()> {
    // accepted sockets may inherit the listener's non-blocking mode
    stream.set_nonblocking(false)?;

    let agency = read_handshake(&mut stream)?;
    registry.register(agency, stream.try_clone()?);
    tracing::info!("Agency {} connected from {}", agency, stream.peer_addr()?);

    handler.run(agency, &mut stream)?;
    Ok(())
}
