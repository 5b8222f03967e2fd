//! Request handler definitions
//!
//! Handlers must not block the worker thread: everything the notify route does (certificate refreshes, store writes,
//! the business hooks) is awaited, so a slow notification never holds up the others on the same worker.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use wxpay_notify_engine::{
    traits::{BusinessCallback, CertificateSource, EventStore},
    NotificationProcessor,
    ProcessingOutcome,
};

use crate::{
    data_objects::{JsonResponse, NotifyReply},
    helpers::notification_headers,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(JsonResponse::ok("It works"))
}

//----------------------------------------------   Notify  ----------------------------------------------------
route!(notify => Post "/notify" impl CertificateSource, EventStore, BusinessCallback);
/// The provider's notification endpoint.
///
/// The body is taken as raw bytes, since the signature covers the exact bytes that were sent. Any rejection is
/// answered with a 500 so that the provider retries later.
pub async fn notify<C, S, H>(
    req: HttpRequest,
    body: web::Bytes,
    processor: web::Data<NotificationProcessor<C, S, H>>,
) -> HttpResponse
where
    C: CertificateSource,
    S: EventStore,
    H: BusinessCallback,
{
    trace!("💻️ Received notification ({} bytes) from {:?}", body.len(), req.peer_addr());
    let headers = notification_headers(req.headers());
    match processor.handle(&headers, &body).await {
        ProcessingOutcome::Acknowledged { event_id } => {
            debug!("💻️ Notification for event {event_id} acknowledged");
            HttpResponse::Ok().json(NotifyReply::success())
        },
        ProcessingOutcome::AlreadyProcessed { event_id } => {
            debug!("💻️ Duplicate notification for event {event_id} acknowledged");
            HttpResponse::Ok().json(NotifyReply::success())
        },
        ProcessingOutcome::Rejected(e) => {
            debug!("💻️ Notification rejected with {}", e.kind());
            HttpResponse::InternalServerError().json(NotifyReply::failure())
        },
    }
}
