use session_core::output::{OutputChannel, TailPoller, TailSnapshot};

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::watch;

fn channel_in(dir: &TempDir) -> OutputChannel {
    OutputChannel::new(dir.path().join("session").join("output.log"))
}

// ============================================================================
// tail()
// ============================================================================

/// **VALUE**: Verifies `tail(B)` returns exactly the last `min(B, len)` bytes after every append.
///
/// **WHY THIS MATTERS**: The correlator parses this suffix. One byte too many or too few
/// corrupts the first line, which every parsing rule drops as a header.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one in the seek offset, or reading from the
/// start of the file once the log outgrows the bound.
#[tokio::test]
async fn given_growing_log_when_tailing_then_returns_exact_suffix() {
    // GIVEN: An empty channel and a shadow copy of what was written
    let dir = TempDir::new().unwrap();
    let channel = channel_in(&dir);
    let mut written: Vec<u8> = Vec::new();

    for chunk in ["first line\n", "second\n", "x", "a much longer third line of output\n"] {
        // WHEN: Appending a chunk
        channel.append(chunk.as_bytes()).await.unwrap();
        written.extend_from_slice(chunk.as_bytes());

        // THEN: Every bound yields the matching suffix
        for bound in [0usize, 1, 5, 16, written.len(), written.len() + 10] {
            let tail = channel.tail(bound).await.unwrap();
            let expected = &written[written.len() - bound.min(written.len())..];
            assert_eq!(tail, expected, "bound {bound} after {} bytes", written.len());
        }
    }
}

#[tokio::test]
async fn given_missing_log_when_tailing_then_returns_empty() {
    // GIVEN: A channel whose file was never created
    let dir = TempDir::new().unwrap();
    let channel = channel_in(&dir);

    // WHEN: Tailing it
    let tail = channel.tail(1024).await;

    // THEN: Empty, not an error
    assert_eq!(tail.unwrap(), Vec::<u8>::new());
    assert!(!channel.path().exists());
}

// ============================================================================
// clear()
// ============================================================================

/// **VALUE**: Verifies `clear()` empties the log and advances the epoch.
///
/// **WHY THIS MATTERS**: The correlator clears before each dispatch and ignores any tail read
/// from an older epoch. Without the epoch bump, stale output would be parsed as the response.
///
/// **BUG THIS CATCHES**: Would catch `clear()` deleting the file instead of truncating (later
/// appends racing file creation) or forgetting to bump the epoch.
#[tokio::test]
async fn given_content_when_cleared_then_tail_is_empty_and_epoch_advances() {
    // GIVEN: A channel with content
    let dir = TempDir::new().unwrap();
    let channel = channel_in(&dir);
    channel.append_line("List of devices attached").await.unwrap();
    let before = channel.epoch();

    // WHEN: Clearing it
    channel.clear().await.unwrap();

    // THEN: The tail is empty and the epoch moved on
    assert!(channel.tail(4096).await.unwrap().is_empty());
    let snapshot = channel.tail_snapshot(4096).await.unwrap();
    assert_eq!(
        snapshot,
        TailSnapshot {
            epoch: before + 1,
            text: String::new(),
        }
    );

    // AND: Appends after the clear land in the same file
    channel.append_line("after").await.unwrap();
    assert_eq!(channel.tail_text(4096).await.unwrap(), "after\n");
}

/// **VALUE**: Verifies concurrent appends, clears, and tails never expose a torn write.
///
/// **WHY THIS MATTERS**: The tail poller, the bridge output pumps, and the correlator's clears
/// all hit the same file at once. A tail that sees half a chunk hands a broken line to a parser.
///
/// **BUG THIS CATCHES**: Would catch any operation skipping the channel's I/O lock.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_concurrent_writers_when_tailing_then_only_whole_chunks_observed() {
    // GIVEN: A shared channel and a fixed chunk
    let dir = TempDir::new().unwrap();
    let channel = Arc::new(channel_in(&dir));
    const CHUNK: &str = "0123456789abcdef\n";

    let writer = {
        let channel = Arc::clone(&channel);
        tokio::spawn(async move {
            for _ in 0..200 {
                channel.append(CHUNK.as_bytes()).await.unwrap();
            }
        })
    };
    let clearer = {
        let channel = Arc::clone(&channel);
        tokio::spawn(async move {
            for _ in 0..20 {
                channel.clear().await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    // WHEN: Tailing while both run, with a bound that is a whole number of chunks
    for _ in 0..200 {
        let text = channel.tail_text(CHUNK.len() * 4).await.unwrap();

        // THEN: The tail is always a run of complete chunks
        assert_eq!(text.len() % CHUNK.len(), 0, "Torn tail: {text:?}");
        assert!(
            text.split_inclusive('\n').all(|line| line == CHUNK),
            "Torn tail: {text:?}"
        );
    }

    writer.await.unwrap();
    clearer.await.unwrap();
}

// ============================================================================
// TailPoller
// ============================================================================

/// **VALUE**: Verifies the poller publishes only on change, and treats a clear as a change.
///
/// **WHY THIS MATTERS**: Two identical responses to two requests must both be seen. If the
/// poller compared text only, the second response would never reach the correlator.
///
/// **BUG THIS CATCHES**: Would catch dropping the epoch from the change check.
#[tokio::test]
async fn given_poller_when_content_repeats_across_clear_then_republishes() {
    // GIVEN: A poller over a channel with one line
    let dir = TempDir::new().unwrap();
    let channel = Arc::new(channel_in(&dir));
    let (tx, mut rx) = watch::channel(TailSnapshot::default());
    let mut poller = TailPoller::new(Arc::clone(&channel), 1024, tx);
    channel.append_line("ABCD1234\tdevice").await.unwrap();

    // WHEN/THEN: The first poll publishes, an unchanged second poll does not
    assert!(poller.poll_once().await);
    assert_eq!(rx.borrow_and_update().text, "ABCD1234\tdevice\n");
    assert!(!poller.poll_once().await);
    assert!(!rx.has_changed().unwrap());

    // WHEN: The same text is written again after a clear
    channel.clear().await.unwrap();
    channel.append_line("ABCD1234\tdevice").await.unwrap();

    // THEN: It is published again under the new epoch
    assert!(poller.poll_once().await);
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.text, "ABCD1234\tdevice\n");
    assert_eq!(snapshot.epoch, 1);
}
