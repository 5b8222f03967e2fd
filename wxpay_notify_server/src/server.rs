use std::{future::Future, net::IpAddr, pin::Pin, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::future::{ok, Either};
use log::*;
use wxpay_notify_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    traits::{BusinessCallback, CertificateSource, EventStore},
    DirectoryCertificateSource,
    MemoryEventStore,
    NotificationProcessor,
    PayloadDecryptor,
    SqliteEventStore,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    helpers::get_remote_ip,
    routes::{health, index, NotifyRoute},
};

const HOOK_BUFFER_SIZE: usize = 25;

pub type ServerProcessor<S> = NotificationProcessor<DirectoryCertificateSource, S, EventProducers>;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let decryptor = PayloadDecryptor::from_secret(&config.apiv3_key)?;
    let source = DirectoryCertificateSource::new(&config.cert_dir);
    let handlers = EventHandlers::new(HOOK_BUFFER_SIZE, default_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let options = config.processor_options();
    match config.database_url.clone() {
        Some(url) => {
            let store = SqliteEventStore::connect(&url).await?;
            info!("🗃️ Processed events are stored in {url}");
            serve(config, NotificationProcessor::new(source, store, producers, decryptor, options)).await
        },
        None => {
            let store = MemoryEventStore::new();
            serve(config, NotificationProcessor::new(source, store, producers, decryptor, options)).await
        },
    }
}

async fn serve<S>(config: ServerConfig, processor: ServerProcessor<S>) -> Result<(), ServerError>
where S: EventStore + Send + Sync + 'static {
    match processor.certificates().warm_up().await {
        Ok(0) => warn!(
            "🚨️ No platform certificates were found in {}. Every notification will be rejected until one is added.",
            config.cert_dir.display()
        ),
        Ok(n) => info!("📜️ {n} platform certificates loaded"),
        Err(e) => warn!("📜️ Could not load platform certificates at start-up. {e}"),
    }
    let srv = create_server_instance(config, web::Data::new(processor))?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance<C, S, H>(
    config: ServerConfig,
    processor: web::Data<NotificationProcessor<C, S, H>>,
) -> Result<Server, ServerError>
where
    C: CertificateSource + Send + Sync + 'static,
    S: EventStore + Send + Sync + 'static,
    H: BusinessCallback + Send + Sync + 'static,
{
    let routes = RouteOptions::from_config(&config);
    let srv = HttpServer::new(move || {
        let routes = routes.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("wxn::access_log"))
            .app_data(processor.clone())
            .configure(|cfg| configure_routes::<C, S, H>(cfg, routes))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// The subset of the configuration the routes need.
#[derive(Clone, Debug, Default)]
pub struct RouteOptions {
    pub url_prefix: String,
    pub notify_whitelist: Option<Vec<IpAddr>>,
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl RouteOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            url_prefix: config.url_prefix.clone(),
            notify_whitelist: config.notify_whitelist.clone(),
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
        }
    }
}

/// Registers all routes. The processor must already be registered as app data.
pub fn configure_routes<C, S, H>(cfg: &mut web::ServiceConfig, options: RouteOptions)
where
    C: CertificateSource + 'static,
    S: EventStore + 'static,
    H: BusinessCallback + 'static,
{
    let RouteOptions { url_prefix, notify_whitelist, use_x_forwarded_for, use_forwarded } = options;
    let notify_scope = web::scope(&url_prefix)
        .wrap_fn(move |req, srv| {
            let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
            let allowed = match (peer_ip, &notify_whitelist) {
                (_, None) => true,
                (Some(ip), Some(whitelist)) => {
                    let allowed = whitelist.contains(&ip);
                    if !allowed {
                        warn!("💻️ Notification from {ip}, which is not on the whitelist. Denying access.");
                    }
                    allowed
                },
                (None, Some(_)) => {
                    warn!("💻️ No IP address found for the notifying peer. Denying access.");
                    false
                },
            };
            if allowed {
                Either::Left(srv.call(req))
            } else {
                let peer = peer_ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".into());
                Either::Right(ok(req.error_response(ServerError::ForbiddenPeer(peer))))
            }
        })
        .service(index)
        .service(NotifyRoute::<C, S, H>::new());
    cfg.service(health).service(index).service(notify_scope);
}

/// Logs every processed payment event. Merchants replace these with their own order handling.
pub fn default_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_payment_succeeded(|ev| {
            Box::pin(async move {
                let amount = ev.amount.map(|a| a.to_string()).unwrap_or_else(|| "an unknown amount".into());
                info!("📬️ Order {} paid {amount} (transaction {})", ev.out_trade_no, ev.transaction_id);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
        .on_payment_failed(|ev| {
            Box::pin(async move {
                let state = ev.trade_state.unwrap_or_default();
                info!("📬️ Payment for order {} did not complete ({state})", ev.out_trade_no);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
        .on_refund(|ev| {
            Box::pin(async move {
                let status = ev.refund_status.unwrap_or_default();
                info!("📬️ Refund {} for order {} is {status}", ev.refund_id, ev.out_trade_no);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
    hooks
}
