#[cfg(test)]
mod tests {
    use deferred::{Deferred, EventLoop, Scheduler, State};
    use futures::executor::block_on;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::{thread, time::Duration};

    fn fulfilled(scheduler: &Scheduler, value: i32) -> Deferred<i32, String> {
        Deferred::resolved(scheduler, value)
    }

    fn rejected(scheduler: &Scheduler, reason: &str) -> Deferred<i32, String> {
        Deferred::rejected(scheduler, reason.to_string())
    }

    #[test]
    fn test_settled_payload_never_changes() {
        let event_loop = EventLoop::new();
        let (resolver, deferred) = Deferred::<i32, String>::pair(&event_loop.scheduler());
        resolver.reject("first".into());
        resolver.resolve(1);
        resolver.reject("second".into());
        event_loop.run_until_idle();
        assert_eq!(deferred.state(), State::Rejected("first".to_string()));
    }

    #[test]
    fn test_then_doubles_value() {
        let event_loop = EventLoop::new();
        let deferred = Deferred::<i32, String>::new(&event_loop.scheduler(), |resolve| {
            resolve.resolve(5);
            Ok(())
        })
        .then(|v| Ok(v * 2));
        assert_eq!(event_loop.block_on(&deferred).unwrap(), Ok(10));
    }

    #[test]
    fn test_catch_at_end_of_chain_sees_rejection() {
        let event_loop = EventLoop::new();
        let deferred = Deferred::<String, String>::new(&event_loop.scheduler(), |resolver| {
            resolver.reject("x".into());
            Ok(())
        })
        .then(|v| Ok(v))
        .catch(|e| Ok(e));
        assert_eq!(event_loop.block_on(&deferred).unwrap(), Ok("x".to_string()));
    }

    #[test]
    fn test_all_keeps_input_order() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let (r1, d1) = Deferred::<i32, String>::pair(&scheduler);
        let (r2, d2) = Deferred::<i32, String>::pair(&scheduler);
        let (r3, d3) = Deferred::<i32, String>::pair(&scheduler);
        let all = Deferred::all(&scheduler, vec![d1, d2, d3]);
        r3.resolve(3);
        r1.resolve(1);
        r2.resolve(2);
        assert_eq!(event_loop.block_on(&all).unwrap(), Ok(vec![1, 2, 3]));

        let all = Deferred::all(
            &scheduler,
            [fulfilled(&scheduler, 1), fulfilled(&scheduler, 2), fulfilled(&scheduler, 3)],
        );
        assert_eq!(event_loop.block_on(&all).unwrap(), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn test_all_rejects_without_waiting_for_stragglers() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let third = Deferred::after(&scheduler, Duration::from_secs(60), 3);
        let all = Deferred::all(
            &scheduler,
            [fulfilled(&scheduler, 1), rejected(&scheduler, "boom"), third],
        );
        assert_eq!(event_loop.block_on(&all).unwrap(), Err("boom".to_string()));
        // Settled before the third input's timer was ever reached.
        assert_eq!(event_loop.now(), Duration::ZERO);
        assert_eq!(event_loop.pending_timers(), 1);
        event_loop.run_until_idle();
        assert_eq!(all.state(), State::Rejected("boom".to_string()));
    }

    #[test]
    fn test_handlers_run_in_order_after_current_block() {
        let event_loop = EventLoop::new();
        let (resolver, deferred) = Deferred::<&str, ()>::pair(&event_loop.scheduler());
        let seen = Arc::new(Mutex::new(vec![]));

        for name in ["handleSuccess", "logSuccess"] {
            let seen = seen.clone();
            deferred.then_or_else(
                move |value| {
                    seen.lock().push(format!("{name}: {value}"));
                    Ok(())
                },
                |_| Ok(()),
            );
        }
        resolver.resolve("Yay!");
        assert!(seen.lock().is_empty());

        event_loop.run_until_idle();
        assert_eq!(
            *seen.lock(),
            vec!["handleSuccess: Yay!".to_string(), "logSuccess: Yay!".to_string()]
        );
    }

    #[test]
    fn test_all_of_nothing_is_fulfilled_immediately() {
        let event_loop = EventLoop::new();
        let all = Deferred::<i32, String>::all(&event_loop.scheduler(), Vec::new());
        assert_eq!(all.state(), State::Fulfilled(vec![]));
    }

    #[test]
    fn test_returned_deferred_is_flattened() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let inner_scheduler = scheduler.clone();
        let deferred = fulfilled(&scheduler, 1).then(move |v| {
            Deferred::<i32, String>::new(&inner_scheduler, move |resolver| {
                resolver.resolve(v + 1);
                Ok(())
            })
        });
        assert_eq!(event_loop.block_on(&deferred).unwrap(), Ok(2));
    }

    #[test]
    fn test_chained_composition_with_delays() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let second_scheduler = scheduler.clone();
        let chain = Deferred::<u32, String>::after(&scheduler, Duration::from_millis(500), 10)
            .then(move |first| {
                Deferred::<u32, String>::after(&second_scheduler, Duration::from_millis(500), first + 5)
            })
            .map(|second| second * 2);
        assert_eq!(event_loop.block_on(&chain).unwrap(), Ok(30));
        assert_eq!(event_loop.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_await_while_another_thread_drives_the_loop() {
        let event_loop = EventLoop::new();
        let deferred = Deferred::<String, String>::after(
            &event_loop.scheduler(),
            Duration::from_millis(2000),
            String::from("🍓"),
        )
        .map(|fruit| format!("我等到了{fruit}"));

        let waiter = deferred.clone();
        let task1 = thread::spawn(move || block_on(waiter));
        let driver = event_loop.clone();
        let task2 = thread::spawn(move || driver.block_on(&deferred));

        assert_eq!(
            task2.join().expect("The task2 thread has panicked"),
            Ok(Ok("我等到了🍓".to_string()))
        );
        assert_eq!(
            task1.join().expect("The task1 thread has panicked"),
            Ok("我等到了🍓".to_string())
        );
    }
}
