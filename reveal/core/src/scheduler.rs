//! Reveal Scheduling
//!
//! The upstream answer service returns one complete reply. The scheduler
//! presents that reply as if it were streaming: a background task ticks at a
//! fixed cadence and emits one growing prefix per character, each prefix
//! already divided by the stability splitter into a renderable head and a
//! withheld tail.
//!
//! # Cancellation
//!
//! Every reveal owns (or shares) a [`CancellationToken`]. The token is the
//! single authoritative cancelled flag: it is checked before *every*
//! emission, not just used to tear the timer down, so a tick that is already
//! in flight when `cancel()` lands is dropped instead of delivered. `cancel`
//! is idempotent and a no-op after natural completion.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::markdown::split_stable;

/// One emission of the reveal: a growing prefix of the full reply, split
/// into its stable and unstable halves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealFrame {
    /// Number of characters of the full reply this frame covers.
    pub revealed: usize,
    /// Stable half of the prefix, safe for formatted rendering.
    pub stable: String,
    /// Withheld suffix of the prefix. Still shown to the user as a visually
    /// distinct in-flight tail so no characters silently vanish; it is only
    /// kept out of the formatted rendering path.
    pub unstable: String,
}

/// Receiver for reveal output.
///
/// Completion is a distinct call carrying the literal full reply so the
/// caller can bypass the splitter for the final state and never leave a
/// trailing unstable fragment visible.
#[async_trait]
pub trait RevealSink: Send + Sync {
    /// Deliver one frame of the in-progress reveal.
    async fn on_frame(&self, frame: RevealFrame);

    /// The reveal reached the end of the text.
    async fn on_settled(&self, final_text: &str);
}

/// Handle to an in-flight reveal.
pub struct RevealHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RevealHandle {
    /// Stop the reveal. No frame is delivered after this returns, even one
    /// whose tick already fired. Idempotent; a no-op after completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the reveal has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the reveal task has finished (settled or cancelled).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the reveal task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawns fixed-cadence reveals of complete reply texts.
///
/// The cadence is constant per character; there is no backoff and no
/// length-based speed adjustment.
#[derive(Clone, Debug)]
pub struct RevealScheduler {
    interval: Duration,
}

impl RevealScheduler {
    /// Create a scheduler with the given per-character cadence.
    ///
    /// Sub-millisecond intervals are clamped to 1ms, the shortest period the
    /// tokio interval timer accepts.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Per-character cadence of reveals spawned by this scheduler.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start revealing `full_text` with a fresh cancellation token.
    #[must_use]
    pub fn spawn(&self, full_text: String, sink: Arc<dyn RevealSink>) -> RevealHandle {
        self.spawn_with_token(full_text, sink, CancellationToken::new())
    }

    /// Start revealing `full_text`, tied to a caller-supplied token.
    ///
    /// Sharing the token with the request that produced the text lets one
    /// `cancel()` tear down the whole turn.
    #[must_use]
    pub fn spawn_with_token(
        &self,
        full_text: String,
        sink: Arc<dyn RevealSink>,
        cancel: CancellationToken,
    ) -> RevealHandle {
        let interval = self.interval;
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            // Prefix boundaries per character; slicing at byte offsets from
            // char_indices keeps every frame on a char boundary.
            let boundaries: Vec<usize> = full_text
                .char_indices()
                .map(|(i, c)| i + c.len_utf8())
                .collect();

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick completes immediately; consume it so
            // the first frame honors the cadence.
            ticker.tick().await;

            for (index, end) in boundaries.iter().enumerate() {
                tokio::select! {
                    () = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                // Authoritative check: a tick may already have fired when
                // cancellation lands.
                if token.is_cancelled() {
                    return;
                }

                let prefix = &full_text[..*end];
                let split = split_stable(prefix);
                sink.on_frame(RevealFrame {
                    revealed: index + 1,
                    stable: split.stable.to_string(),
                    unstable: split.unstable.to_string(),
                })
                .await;
            }

            if token.is_cancelled() {
                return;
            }
            sink.on_settled(&full_text).await;
        });

        RevealHandle { cancel, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Sink that records everything it receives and can cancel a shared
    /// token after a set number of frames.
    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<RevealFrame>>,
        settled: Mutex<Option<String>>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self::default()
        }

        fn cancelling_after(frames: usize, token: CancellationToken) -> Self {
            Self {
                cancel_after: Some((frames, token)),
                ..Self::default()
            }
        }

        fn frame_count(&self) -> usize {
            self.frames.lock().len()
        }
    }

    #[async_trait]
    impl RevealSink for RecordingSink {
        async fn on_frame(&self, frame: RevealFrame) {
            let count = {
                let mut frames = self.frames.lock();
                frames.push(frame);
                frames.len()
            };
            if let Some((after, token)) = &self.cancel_after {
                if count >= *after {
                    token.cancel();
                }
            }
        }

        async fn on_settled(&self, final_text: &str) {
            *self.settled.lock() = Some(final_text.to_string());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_emits_one_frame_per_char_then_settles() {
        let scheduler = RevealScheduler::new(Duration::from_millis(10));
        let sink = Arc::new(RecordingSink::new());
        let handle = scheduler.spawn("abc".to_string(), sink.clone());
        handle.join().await;

        let frames = sink.frames.lock();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].stable, "a");
        assert_eq!(frames[1].stable, "ab");
        assert_eq!(frames[2].stable, "abc");
        assert!(frames.iter().all(|f| f.unstable.is_empty()));
        assert_eq!(sink.settled.lock().as_deref(), Some("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_carry_split_view_and_settle_is_literal() {
        let scheduler = RevealScheduler::new(Duration::from_millis(5));
        let sink = Arc::new(RecordingSink::new());
        let text = "Hi **there**!";
        let handle = scheduler.spawn(text.to_string(), sink.clone());
        handle.join().await;

        let frames = sink.frames.lock();
        assert_eq!(frames.len(), text.chars().count());
        for frame in frames.iter() {
            // Nothing is dropped from view: the halves recompose the prefix.
            let prefix: String = text.chars().take(frame.revealed).collect();
            assert_eq!(format!("{}{}", frame.stable, frame.unstable), prefix);
        }
        // The formatted half holds at "Hi " through the whole bold span and
        // only advances once the span closes; no dangling marker ever shows.
        let stables: Vec<&str> = frames.iter().map(|f| f.stable.as_str()).collect();
        assert_eq!(
            stables,
            vec![
                "H",
                "Hi",
                "Hi ",
                "Hi ",
                "Hi ",
                "Hi ",
                "Hi ",
                "Hi ",
                "Hi ",
                "Hi ",
                "Hi ",
                "Hi **there**",
                "Hi **there**!",
            ]
        );
        // Settle delivers the literal text, bold markers and all.
        assert_eq!(sink.settled.lock().as_deref(), Some(text));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_reveal_stops_emissions() {
        let token = CancellationToken::new();
        let sink = Arc::new(RecordingSink::cancelling_after(2, token.clone()));
        let scheduler = RevealScheduler::new(Duration::from_millis(10));
        let handle =
            scheduler.spawn_with_token("abcdef".to_string(), sink.clone(), token);
        handle.join().await;

        // The sink cancelled during frame 2: frame 3 was never delivered
        // even though its tick was already scheduled.
        assert_eq!(sink.frame_count(), 2);
        assert!(sink.settled.lock().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_and_safe_after_completion() {
        let scheduler = RevealScheduler::new(Duration::from_millis(1));
        let sink = Arc::new(RecordingSink::new());
        let handle = scheduler.spawn("ok".to_string(), sink.clone());

        // Wait for natural completion, then cancel repeatedly.
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(sink.settled.lock().as_deref(), Some("ok"));
        assert_eq!(sink.frame_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_settles_without_frames() {
        let scheduler = RevealScheduler::new(Duration::from_millis(10));
        let sink = Arc::new(RecordingSink::new());
        let handle = scheduler.spawn(String::new(), sink.clone());
        handle.join().await;

        assert_eq!(sink.frame_count(), 0);
        assert_eq!(sink.settled.lock().as_deref(), Some(""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_multibyte_text_reveals_on_char_boundaries() {
        let scheduler = RevealScheduler::new(Duration::from_millis(2));
        let sink = Arc::new(RecordingSink::new());
        let text = "héllo 日本";
        let handle = scheduler.spawn(text.to_string(), sink.clone());
        handle.join().await;

        let frames = sink.frames.lock();
        assert_eq!(frames.len(), text.chars().count());
        let last = frames.last().expect("at least one frame");
        assert_eq!(last.stable, text);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let scheduler = RevealScheduler::new(Duration::ZERO);
        assert_eq!(scheduler.interval(), Duration::from_millis(1));
    }
}
