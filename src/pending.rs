use tokio::task::{JoinError, JoinHandle};

/// Takes the task out of `slot` once it has finished; unfinished tasks stay put.
pub(crate) async fn take_finished<T>(
    slot: &mut Option<JoinHandle<T>>,
) -> Option<Result<T, JoinError>> {
    let handle = slot.take()?;
    if !handle.is_finished() {
        *slot = Some(handle);
        return None;
    }
    Some(handle.await)
}
