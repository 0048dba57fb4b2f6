macro_rules! assert_approx {
    ($left: expr, $right: expr, $epsilon: expr) => {{
        let diff = ($left - $right).abs();
        assert!(diff <= $epsilon)
    }};
}

// A small value to absorb rounding while converting instants
pub const EPSILON: i64 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsched::clock::{AdvanceableSchedulerClock, SchedulerClock, VirtualClock};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_initial_epoch() {
        let clock = VirtualClock::from_epoch();
        assert_approx!(clock.now().await, 0, EPSILON);
    }

    #[tokio::test]
    async fn test_custom_time() {
        let clock = VirtualClock::new(45_000);
        assert_approx!(clock.now().await, 45_000, EPSILON);
    }

    #[tokio::test]
    async fn test_advance() {
        let clock = VirtualClock::from_epoch();
        clock.advance(Duration::from_secs(1)).await;
        assert_eq!(clock.now().await, 1_000);
        clock.advance(Duration::from_secs(100)).await;
        assert_eq!(clock.now().await, 101_000);
    }

    #[tokio::test]
    async fn test_advance_to() {
        let clock = VirtualClock::from_epoch();
        clock.advance_to(19_000).await;
        assert_approx!(clock.now().await, 19_000, EPSILON);
        clock.advance_to(235_000).await;
        assert_approx!(clock.now().await, 235_000, EPSILON);
    }

    #[tokio::test]
    async fn test_idle_to_past_returns_immediately() {
        let clock = VirtualClock::new(5_000);
        clock.idle_to(5_000).await;
        clock.idle_to(1_000).await;
        assert_eq!(clock.now().await, 5_000);
    }

    #[tokio::test]
    async fn test_idle_to_released_by_advance() {
        let clock = Arc::new(VirtualClock::from_epoch());
        let waiter = clock.clone();
        let idle = tokio::spawn(async move {
            waiter.idle_to(5_000).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!idle.is_finished());

        clock.advance_to(5_000).await;
        idle.await.unwrap();
        assert_eq!(clock.now().await, 5_000);
    }
}
