use super::*;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

fn payload(txt: &str) -> Payload {
    Arc::from(txt)
}

#[test]
fn broadcast_reaches_every_registration() {
    let hub = Hub::new(10);
    let mut clients: Vec<Registration> = (0..5).map(|_| hub.register()).collect();

    let delivery = hub.broadcast(&payload(r#"{"id":1,"content":"hi"}"#));

    assert_eq!(delivery, Delivery { delivered: 5, dropped: 0 });
    for client in clients.iter_mut() {
        assert_eq!(client.try_recv().as_deref(), Some(r#"{"id":1,"content":"hi"}"#));
    }
}

#[test]
fn register_then_deregister_restores_membership() {
    let hub = Hub::new(10);
    let _existing = hub.register();
    let before = hub.len();

    let client = hub.register();
    let id = client.id();
    assert_eq!(hub.len(), before + 1);

    assert!(hub.deregister(id));
    assert_eq!(hub.len(), before);
    assert!(!hub.deregister(id), "a second deregister is a no-op");

    drop(client); // Drop deregisters again, which must also be a no-op
    assert_eq!(hub.len(), before);
    assert_eq!(hub.stats().deregistered, 1);
}

#[test]
fn dropping_a_registration_deregisters_it_once() {
    let hub = Hub::new(10);
    let client = hub.register();
    assert_eq!(hub.len(), 1);
    drop(client);
    assert!(hub.is_empty());
    assert_eq!(hub.stats().registered, 1);
    assert_eq!(hub.stats().deregistered, 1);
}

#[test]
fn full_queue_drops_only_for_that_client() {
    let hub = Hub::new(1);
    let mut fast = hub.register();
    let mut slow = hub.register();
    hub.broadcast(&payload("0"));
    assert_eq!(fast.try_recv().as_deref(), Some("0"));
    // `slow` never reads, so its single slot stays occupied

    let delivery = hub.broadcast(&payload("1"));
    assert_eq!(delivery, Delivery { delivered: 1, dropped: 1 });
    assert_eq!(fast.try_recv().as_deref(), Some("1"));
    assert_eq!(slow.try_recv().as_deref(), Some("0"));
    assert_eq!(slow.try_recv(), None);
    assert_eq!(hub.stats().dropped, 1);
}

#[test]
fn a_drop_is_transient() {
    let hub = Hub::new(10);
    let mut a = hub.register();
    hub.broadcast(&payload(r#"{"id":1,"content":"hi"}"#));
    assert_eq!(a.try_recv().as_deref(), Some(r#"{"id":1,"content":"hi"}"#));

    let small = Hub::new(1);
    let mut b = small.register();
    small.broadcast(&payload("filler"));
    let dropped = small.broadcast(&payload(r#"{"id":1,"content":"hi"}"#));
    assert_eq!(dropped.dropped, 1);

    assert_eq!(b.try_recv().as_deref(), Some("filler"));
    let delivered = small.broadcast(&payload(r#"{"id":2,"content":"again"}"#));
    assert_eq!(delivered, Delivery { delivered: 1, dropped: 0 });
    assert_eq!(b.try_recv().as_deref(), Some(r#"{"id":2,"content":"again"}"#));
}

#[test]
fn one_client_reads_broadcasts_in_order() {
    let hub = Hub::new(10);
    let mut client = hub.register();
    for id in 1..=3 {
        hub.broadcast(&payload(&format!(r#"{{"id":{}}}"#, id)));
    }
    let received: Vec<String> = std::iter::from_fn(|| client.try_recv())
        .map(|p| p.to_string())
        .collect();
    assert_eq!(received, vec![r#"{"id":1}"#, r#"{"id":2}"#, r#"{"id":3}"#]);
}

#[test]
fn no_delivery_after_deregistration() {
    let hub = Hub::new(10);
    let mut client = hub.register();
    hub.deregister(client.id());
    let delivery = hub.broadcast(&payload("late"));
    assert_eq!(delivery, Delivery::default());
    assert_eq!(client.try_recv(), None);
}

#[test]
fn close_all_empties_the_registry() {
    let hub = Hub::new(10);
    let clients: Vec<Registration> = (0..3).map(|_| hub.register()).collect();
    assert_eq!(hub.close_all(), 3);
    assert!(hub.is_empty());
    drop(clients);
    assert_eq!(hub.stats().deregistered, 3);
}

#[test]
fn concurrent_connects_and_broadcasts_keep_the_registry_consistent() {
    let hub = Hub::new(4);
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let hub = Arc::clone(&hub);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let mut client = hub.register();
                    hub.broadcast(&payload("x"));
                    while client.try_recv().is_some() {}
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }
    assert!(hub.is_empty());
    let stats = hub.stats();
    assert_eq!(stats.registered, 1600);
    assert_eq!(stats.deregistered, 1600);
}

#[tokio::test]
async fn stalled_client_does_not_delay_fast_clients() {
    let hub = Hub::new(2);
    let (input, broadcaster) = broadcast_channel(Arc::clone(&hub), 100);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(broadcaster.run(shutdown_rx));

    let _stalled = hub.register();
    let mut fast: Vec<Registration> = (0..20).map(|_| hub.register()).collect();

    for id in 0..10 {
        assert!(input.forward(payload(&id.to_string())));
        for client in fast.iter_mut() {
            let got = timeout(Duration::from_secs(1), client.recv())
                .await
                .expect("fast client waited on the stalled one");
            assert_eq!(got.as_deref(), Some(id.to_string().as_str()));
        }
    }
    assert_eq!(hub.stats().dropped, 8);

    drop(input);
    timeout(Duration::from_secs(1), task)
        .await
        .expect("broadcaster should stop once its input closes")
        .expect("broadcaster panicked");
}

#[tokio::test]
async fn full_input_queue_drops_and_counts() {
    let hub = Hub::new(10);
    let (input, _broadcaster) = broadcast_channel(Arc::clone(&hub), 2);
    assert!(input.forward(payload("1")));
    assert!(input.forward(payload("2")));
    assert!(!input.forward(payload("3")));
    assert_eq!(hub.stats().input_dropped, 1);
}

#[tokio::test]
async fn shutdown_leaves_an_empty_registry_and_idle_broadcaster() {
    let hub = Hub::new(10);
    let (input, broadcaster) = broadcast_channel(Arc::clone(&hub), 10);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(broadcaster.run(shutdown_rx));

    let clients: Vec<Registration> = (0..4).map(|_| hub.register()).collect();
    drop(clients);
    shutdown_tx.send(true).expect("broadcaster is listening");

    timeout(Duration::from_secs(1), task)
        .await
        .expect("broadcaster should stop on shutdown")
        .expect("broadcaster panicked");
    assert!(hub.is_empty());
    assert!(!input.forward(payload("after shutdown")));
}
