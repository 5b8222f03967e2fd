use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    App,
};
use wxpay_notify_engine::{
    helpers::NotificationHeaders,
    test_utils::{
        callbacks::CountingCallback,
        fixtures::{test_certificate, TEST_APIV3_KEY, TEST_SERIAL_NO},
    },
    MemoryCertificateSource,
    MemoryEventStore,
    NotificationProcessor,
    PayloadDecryptor,
    ProcessorOptions,
};

use crate::server::{configure_routes, RouteOptions};

pub type TestProcessor = NotificationProcessor<MemoryCertificateSource, MemoryEventStore, CountingCallback>;

pub fn test_processor(callback: CountingCallback) -> web::Data<TestProcessor> {
    let _ = env_logger::try_init();
    let source = MemoryCertificateSource::new(vec![test_certificate(TEST_SERIAL_NO)]);
    let decryptor = PayloadDecryptor::new(TEST_APIV3_KEY.as_bytes()).unwrap();
    let processor =
        NotificationProcessor::new(source, MemoryEventStore::new(), callback, decryptor, ProcessorOptions::default());
    web::Data::new(processor)
}

/// Sends `body` with `headers` to `path` on an app configured with `options`, from the peer `peer`.
pub async fn post_notification(
    processor: &web::Data<TestProcessor>,
    options: RouteOptions,
    path: &str,
    headers: &NotificationHeaders,
    body: &str,
    peer: &str,
) -> (StatusCode, String) {
    let app = App::new()
        .app_data(processor.clone())
        .configure(|cfg| configure_routes::<MemoryCertificateSource, MemoryEventStore, CountingCallback>(cfg, options));
    let service = test::init_service(app).await;
    let mut req = TestRequest::post().uri(path).peer_addr(peer.parse().unwrap()).set_payload(body.to_string());
    for (name, value) in headers.iter() {
        req = req.insert_header((name.to_string(), value.to_string()));
    }
    let (_, res) = test::call_service(&service, req.to_request()).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
