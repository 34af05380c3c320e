//! Upstream change notifications for settings.
//!
//! The database fires `pg_notify('settings:<key>', ...)` whenever a settings
//! row changes. [`PgChangeFeed`] owns a single `PgListener` connection and
//! turns those notifications into [`FeedEvent`]s. Payloads are ignored: the
//! hub refetches the row, so large values never travel over `NOTIFY`.

use std::collections::HashSet;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use bloomtable_core::SettingKey;

use super::backoff::Backoff;

/// Something that happened upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The row for this key was inserted, updated or deleted.
    Changed(SettingKey),
    /// The feed reconnected; notifications may have been missed.
    Resynced,
}

/// Opens and closes upstream subscriptions.
///
/// Called while the subscription registry is locked, so implementations must
/// not block. Events are delivered out of band (see [`PgChangeFeed::spawn`]).
pub trait ChangeFeed: Send + Sync + 'static {
    fn listen(&self, key: &SettingKey);
    fn unlisten(&self, key: &SettingKey);
}

/// A feed that never reports changes. Values are then only refreshed on TTL
/// expiry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFeed;

impl ChangeFeed for NoopFeed {
    fn listen(&self, _key: &SettingKey) {}
    fn unlisten(&self, _key: &SettingKey) {}
}

#[derive(Debug)]
enum Command {
    Listen(SettingKey),
    Unlisten(SettingKey),
}

/// `LISTEN`/`NOTIFY` feed backed by a dedicated Postgres connection.
#[derive(Debug, Clone)]
pub struct PgChangeFeed {
    commands: mpsc::UnboundedSender<Command>,
}

impl PgChangeFeed {
    /// Start the listener task.
    ///
    /// The returned receiver yields events until this feed (and every clone)
    /// is dropped.
    #[must_use]
    pub fn spawn(pool: PgPool) -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        Self::spawn_with_backoff(pool, Backoff::default())
    }

    #[must_use]
    pub fn spawn_with_backoff(
        pool: PgPool,
        backoff: Backoff,
    ) -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let driver = FeedDriver {
            pool,
            commands: command_rx,
            events: event_tx,
            active: HashSet::new(),
            backoff,
        };
        tokio::spawn(driver.run());

        (
            Self {
                commands: command_tx,
            },
            event_rx,
        )
    }
}

impl ChangeFeed for PgChangeFeed {
    fn listen(&self, key: &SettingKey) {
        if self.commands.send(Command::Listen(key.clone())).is_err() {
            warn!(key = %key, "Settings feed task is gone, cannot listen");
        }
    }

    fn unlisten(&self, key: &SettingKey) {
        // Dropped receiver means the task already exited; nothing to close.
        let _ = self.commands.send(Command::Unlisten(key.clone()));
    }
}

enum Step {
    Command(Option<Command>),
    Notification(Result<Option<sqlx::postgres::PgNotification>, sqlx::Error>),
}

/// How a connected session ended.
enum Disconnect {
    /// Feed handle dropped or hub gone; stop for good.
    Shutdown,
    /// Connection failed; reconnect after backing off.
    Lost,
}

struct FeedDriver {
    pool: PgPool,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<FeedEvent>,
    active: HashSet<SettingKey>,
    backoff: Backoff,
}

impl FeedDriver {
    async fn run(mut self) {
        let mut connected_before = false;

        loop {
            match self.connect().await {
                Ok(listener) => {
                    info!(
                        channels = self.active.len(),
                        reconnect = connected_before,
                        "Settings feed connected"
                    );
                    self.backoff.reset();
                    if connected_before && self.events.send(FeedEvent::Resynced).is_err() {
                        return;
                    }
                    connected_before = true;

                    match self.pump(listener).await {
                        Disconnect::Shutdown => return,
                        Disconnect::Lost => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt = self.backoff.attempt(), "Settings feed connect failed");
                }
            }

            let delay = self.backoff.next_delay();
            if !self.wait(delay).await {
                return;
            }
        }
    }

    async fn connect(&self) -> Result<PgListener, sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        let channels: Vec<String> = self.active.iter().map(SettingKey::channel).collect();
        if !channels.is_empty() {
            listener
                .listen_all(channels.iter().map(String::as_str))
                .await?;
        }
        Ok(listener)
    }

    async fn pump(&mut self, mut listener: PgListener) -> Disconnect {
        loop {
            let step = tokio::select! {
                cmd = self.commands.recv() => Step::Command(cmd),
                msg = listener.try_recv() => Step::Notification(msg),
            };

            match step {
                Step::Command(None) => return Disconnect::Shutdown,
                Step::Command(Some(Command::Listen(key))) => {
                    let channel = key.channel();
                    if self.active.insert(key)
                        && let Err(e) = listener.listen(&channel).await
                    {
                        warn!(error = %e, channel = %channel, "LISTEN failed");
                        return Disconnect::Lost;
                    }
                }
                Step::Command(Some(Command::Unlisten(key))) => {
                    let channel = key.channel();
                    if self.active.remove(&key)
                        && let Err(e) = listener.unlisten(&channel).await
                    {
                        warn!(error = %e, channel = %channel, "UNLISTEN failed");
                        return Disconnect::Lost;
                    }
                }
                Step::Notification(Ok(Some(notification))) => {
                    let Some(key) = parse_channel(notification.channel()) else {
                        continue;
                    };
                    if !self.active.contains(&key) {
                        continue;
                    }
                    debug!(key = %key, "Setting changed upstream");
                    if self.events.send(FeedEvent::Changed(key)).is_err() {
                        return Disconnect::Shutdown;
                    }
                }
                Step::Notification(Ok(None)) => {
                    warn!("Settings feed connection closed");
                    return Disconnect::Lost;
                }
                Step::Notification(Err(e)) => {
                    warn!(error = %e, "Settings feed receive failed");
                    return Disconnect::Lost;
                }
            }
        }
    }

    /// Sleep for `delay` while still tracking listen/unlisten requests.
    /// Returns `false` when the feed handle was dropped.
    async fn wait(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return true,
                cmd = self.commands.recv() => match cmd {
                    None => return false,
                    Some(Command::Listen(key)) => {
                        self.active.insert(key);
                    }
                    Some(Command::Unlisten(key)) => {
                        self.active.remove(&key);
                    }
                },
            }
        }
    }
}

/// `settings:heroContent` -> `heroContent`.
fn parse_channel(channel: &str) -> Option<SettingKey> {
    channel
        .strip_prefix("settings:")
        .and_then(|key| SettingKey::parse(key).ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel() {
        assert_eq!(
            parse_channel("settings:heroContent"),
            Some(SettingKey::parse("heroContent").unwrap())
        );
        assert_eq!(parse_channel("orders:1"), None);
        assert_eq!(parse_channel("settings:"), None);
    }

    #[test]
    fn test_channel_roundtrip() {
        let key = SettingKey::parse("businessHours").unwrap();
        assert_eq!(parse_channel(&key.channel()), Some(key));
    }
}
