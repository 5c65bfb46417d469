//! Helpers used together, as a test body would.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use itest_core::{
    CleanupStack, HasVariantInfo, ReadinessPolicy, VariantInfo, Variants, eventually,
    random_string, unique_name, wait_until_ready,
};

#[derive(Clone, Debug, Default)]
struct HostCase {
    name: String,
    check_interval: u32,
    info: VariantInfo,
}

impl HasVariantInfo for HostCase {
    fn set_variant_info(&mut self, info: VariantInfo) {
        self.info = info;
    }
}

#[test]
fn test_variant_labels_build_unique_names() {
    let base = HostCase {
        name: "host".to_string(),
        check_interval: 60,
        ..Default::default()
    };
    let cases = Variants::new(base)
        .vary_tagged("CheckInterval", |c: &mut HostCase, v| c.check_interval = v, [10, 30])
        .vary_tagged("Name", |c: &mut HostCase, v: &str| c.name = v.to_string(), ["a/b"])
        .build();

    let names: Vec<String> = cases
        .iter()
        .map(|c| unique_name("TestHosts", &format!("{}-{}", c.info.label(), c.name)))
        .collect();

    assert_eq!(
        names,
        vec![
            "TestHosts-Base-host-1",
            "TestHosts-CheckInterval-1-host-1",
            "TestHosts-CheckInterval-2-host-1",
            "TestHosts-Name-1-a-b-1",
        ]
    );
}

#[tokio::test]
async fn test_cleanup_stack_across_tasks() {
    let stack = Arc::new(CleanupStack::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..4 {
        let order = Arc::clone(&order);
        stack.defer(format!("resource-{i}"), async move {
            order.lock().unwrap().push(i);
            Ok(())
        });
    }

    let s = Arc::clone(&stack);
    tokio::spawn(async move { s.run().await }).await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec![3, 2, 1, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_readiness_then_eventually() {
    let state = Arc::new(Mutex::new(0u32));

    let s = Arc::clone(&state);
    let ready = wait_until_ready("counter", ReadinessPolicy::new(Duration::from_secs(1), 5), || {
        let s = Arc::clone(&s);
        async move {
            let mut v = s.lock().unwrap();
            *v += 1;
            if *v >= 2 { Ok(*v) } else { Err("starting") }
        }
    })
    .await
    .unwrap();
    assert_eq!(ready, 2);

    let s = Arc::clone(&state);
    let seen = eventually::require(Duration::from_secs(5), Duration::from_millis(100), || {
        let s = Arc::clone(&s);
        async move {
            let mut v = s.lock().unwrap();
            *v += 1;
            if *v >= 5 { Ok(*v) } else { Err(format!("only {}", *v)) }
        }
    })
    .await;
    assert_eq!(seen, 5);
}

#[test]
fn test_random_credentials_differ() {
    let a = random_string(16);
    let b = random_string(16);
    assert_eq!(a.len(), 16);
    assert_ne!(a, b);
}
