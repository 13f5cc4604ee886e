//! Runtime-agnostic sleep, tolerant of non-positive durations.

/// Sleeps for `duration`. Zero or negative durations return immediately.
pub async fn sleep(duration: time::Duration) {
    if !duration.is_positive() {
        return;
    }
    let std_duration: std::time::Duration = duration
        .try_into()
        .unwrap_or(std::time::Duration::MAX);
    tokio::time::sleep(std_duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn negative_duration_is_a_no_op() {
        sleep(time::Duration::seconds(-1)).await;
    }

    #[tokio::test]
    async fn short_sleep_completes() {
        sleep(time::Duration::milliseconds(1)).await;
    }
}
