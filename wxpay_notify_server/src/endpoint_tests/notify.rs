use actix_web::http::StatusCode;
use serde_json::Value;
use wxpay_notify_engine::{
    helpers::HEADER_SIGNATURE,
    test_utils::{
        callbacks::CountingCallback,
        fixtures::{build_envelope, signed_now, transaction_resource},
    },
};

use super::helpers::{post_notification, test_processor};
use crate::server::RouteOptions;

const PEER: &str = "101.226.103.10:34567";

fn body() -> String {
    build_envelope("EV-1", "TRANSACTION.SUCCESS", &transaction_resource("T1", "order-1", 100))
}

fn reply_code(body: &str) -> String {
    let reply: Value = serde_json::from_str(body).unwrap();
    reply["code"].as_str().unwrap().to_string()
}

#[actix_web::test]
async fn notification_is_acknowledged_once() {
    let callback = CountingCallback::new();
    let processor = test_processor(callback.clone());
    let body = body();
    for _ in 0..3 {
        let headers = signed_now(body.as_bytes());
        let (status, reply) =
            post_notification(&processor, RouteOptions::default(), "/notify", &headers, &body, PEER).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply_code(&reply), "SUCCESS");
    }
    assert_eq!(callback.calls(), 1);
}

#[actix_web::test]
async fn bad_signature_fails_the_delivery() {
    let callback = CountingCallback::new();
    let processor = test_processor(callback.clone());
    let body = body();
    let headers = signed_now(body.as_bytes()).with(HEADER_SIGNATURE, "bm90IGEgc2lnbmF0dXJl");
    let (status, reply) =
        post_notification(&processor, RouteOptions::default(), "/notify", &headers, &body, PEER).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["code"], "FAILED");
    assert_eq!(reply["message"], "失败");
    assert_eq!(callback.calls(), 0);
}

#[actix_web::test]
async fn failed_callback_fails_the_delivery() {
    let callback = CountingCallback::failing_first(1);
    let processor = test_processor(callback.clone());
    let body = body();
    let (status, _) =
        post_notification(&processor, RouteOptions::default(), "/notify", &signed_now(body.as_bytes()), &body, PEER)
            .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (status, _) =
        post_notification(&processor, RouteOptions::default(), "/notify", &signed_now(body.as_bytes()), &body, PEER)
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(callback.calls(), 2);
}

#[actix_web::test]
async fn notify_route_honours_the_prefix() {
    let processor = test_processor(CountingCallback::new());
    let options = RouteOptions { url_prefix: "/wxpay".into(), ..Default::default() };
    let body = body();
    let headers = signed_now(body.as_bytes());
    let (status, _) = post_notification(&processor, options.clone(), "/notify", &headers, &body, PEER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, reply) = post_notification(&processor, options, "/wxpay/notify", &headers, &body, PEER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply_code(&reply), "SUCCESS");
}

#[actix_web::test]
async fn whitelist_blocks_unknown_peers() {
    let callback = CountingCallback::new();
    let processor = test_processor(callback.clone());
    let options =
        RouteOptions { notify_whitelist: Some(vec!["101.226.103.10".parse().unwrap()]), ..Default::default() };
    let body = body();
    let headers = signed_now(body.as_bytes());
    let (status, _) =
        post_notification(&processor, options.clone(), "/notify", &headers, &body, "192.0.2.1:5555").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(callback.calls(), 0);
    let (status, _) = post_notification(&processor, options, "/notify", &headers, &body, PEER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(callback.calls(), 1);
}
