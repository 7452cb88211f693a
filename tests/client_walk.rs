//! Walk engine end-to-end tests over the mock transport.

mod common;

use snmpkit::transport::{MockTransport, ResponseBuilder};
use snmpkit::{oid, Auth, Client, Error, Oid, Value};

fn v2c_client(mock: MockTransport) -> Client<MockTransport> {
    common::init_tracing();
    Client::builder("127.0.0.1:161", Auth::v2c("public"))
        .build_with_transport(mock)
        .unwrap()
}

/// A bulk walk over sysORTable: rows arrive ten per round, the final
/// round carries endOfMibView, and every delivered OID stays inside the
/// subtree in strictly increasing order.
#[tokio::test]
async fn bulk_walk_sys_or_table() {
    let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
    let table = oid!(1, 3, 6, 1, 2, 1, 1, 9);

    // Round 1: sysORIndex.1..5 then sysORID.1..5
    let mut round = ResponseBuilder::new(1);
    for i in 1..=5u32 {
        round = round.varbind(oid!(1, 3, 6, 1, 2, 1, 1, 9, 1, 1, i), Value::Integer(i as i64));
    }
    for i in 1..=5u32 {
        round = round.varbind(
            oid!(1, 3, 6, 1, 2, 1, 1, 9, 1, 2, i),
            Value::ObjectIdentifier(oid!(1, 3, 6, 1, 6, 3, 1)),
        );
    }
    mock.queue_response(round.build_v2c(b"public"));

    // Round 2: sysORDescr.1..5 then the view ends
    let mut round = ResponseBuilder::new(2);
    for i in 1..=5u32 {
        round = round.varbind(oid!(1, 3, 6, 1, 2, 1, 1, 9, 1, 3, i), Value::from("module"));
    }
    round = round.varbind(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::EndOfMibView);
    mock.queue_response(round.build_v2c(b"public"));

    let client = v2c_client(mock.clone());
    let results = client.bulk_walk(table.clone(), 10).collect().await.unwrap();

    assert_eq!(results.len(), 15);
    assert!(results.iter().all(|vb| vb.oid.is_descendant_of(&table)));
    for pair in results.windows(2) {
        assert!(pair[0].oid < pair[1].oid, "OIDs must strictly increase");
    }
    assert_eq!(mock.requests().len(), 2);
}

/// A walk rooted at a leaf scalar returns exactly that varbind.
#[tokio::test]
async fn walk_from_leaf_returns_single_varbind() {
    let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
    let sys_name = oid!(1, 3, 6, 1, 2, 1, 1, 5, 0);

    // GETBULK from sysName.0 walks into sysLocation: out of range
    mock.queue_response(
        ResponseBuilder::new(1)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 6, 0), Value::from("rack 4"))
            .build_v2c(b"public"),
    );
    // The engine falls back to a plain GET on the leaf itself
    mock.queue_response(
        ResponseBuilder::new(2)
            .varbind(sys_name.clone(), Value::from("router1"))
            .build_v2c(b"public"),
    );

    let client = v2c_client(mock.clone());
    let results = client.bulk_walk(sys_name.clone(), 10).collect().await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].oid, sys_name);
    assert_eq!(results[0].value.as_str(), Some("router1"));

    // Two rounds on the wire: the GETBULK, then the fallback GET
    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    let second = snmpkit::message::Message::decode(requests[1].data.clone()).unwrap();
    assert_eq!(
        second.try_pdu().unwrap().pdu_type,
        snmpkit::PduType::GetRequest
    );
}

/// Strict ordering: a response repeating the request start aborts.
#[tokio::test]
async fn walk_aborts_on_non_increasing_oid() {
    let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());

    mock.queue_response(
        ResponseBuilder::new(1)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("desc"))
            .build_v2c(b"public"),
    );
    mock.queue_response(
        ResponseBuilder::new(2)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("desc"))
            .build_v2c(b"public"),
    );

    let client = v2c_client(mock);
    let mut walk = client.walk_getnext(oid!(1, 3, 6, 1, 2, 1, 1));

    assert!(walk.next().await.unwrap().is_ok());
    assert!(matches!(
        walk.next().await.unwrap().unwrap_err(),
        Error::NonIncreasingOid { .. }
    ));
}

/// The `"c"` application option tolerates a response whose varbind
/// equals the round's request start (a broken agent echoing the
/// request back).
#[tokio::test]
async fn walk_app_opt_c_disables_ordering_check() {
    let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());

    mock.queue_response(
        ResponseBuilder::new(1)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("first"))
            .build_v2c(b"public"),
    );
    // Round 2 starts at 1.1.0; its first varbind echoes that start
    mock.queue_response(
        ResponseBuilder::new(2)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("echoed"))
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 2, 0), Value::Integer(2))
            .build_v2c(b"public"),
    );
    mock.queue_response(
        ResponseBuilder::new(3)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::EndOfMibView)
            .build_v2c(b"public"),
    );

    let client = Client::builder("127.0.0.1:161", Auth::v2c("public"))
        .app_opt("c")
        .build_with_transport(mock)
        .unwrap();

    let results = client
        .bulk_walk(oid!(1, 3, 6, 1, 2, 1, 1), 10)
        .collect()
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
}

/// Walking with the visitor convenience accumulates the same varbinds
/// the stream yields.
#[tokio::test]
async fn walk_with_collects_through_visitor() {
    let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());

    mock.queue_response(
        ResponseBuilder::new(1)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("a"))
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 2, 0), Value::from("b"))
            .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer(1))
            .build_v2c(b"public"),
    );

    let client = v2c_client(mock);
    let mut seen: Vec<Oid> = Vec::new();
    client
        .walk_with(oid!(1, 3, 6, 1, 2, 1, 1), |vb| {
            seen.push(vb.oid.clone());
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(
        seen,
        vec![oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)]
    );
}

/// An agent error-status terminates the walk cleanly after the
/// varbinds already delivered.
#[tokio::test]
async fn walk_ends_cleanly_on_error_status() {
    let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());

    mock.queue_response(
        ResponseBuilder::new(1)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("only"))
            .build_v2c(b"public"),
    );
    mock.queue_response(
        ResponseBuilder::new(2)
            .error_status(5) // genErr
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::Null)
            .build_v2c(b"public"),
    );

    let client = v2c_client(mock);
    let results = client
        .walk_getnext(oid!(1, 3, 6, 1, 2, 1, 1))
        .collect()
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}
