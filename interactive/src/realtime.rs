//! The browser side of the change feed: one websocket per page, shared by
//! every watch, kept alive with heartbeats and reopened after a drop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use agora_shared::realtime::{
    ChangeFeed, Frame, Handler, Hub, Subscription, Watch, HEARTBEAT_SECS, RECONNECT_SECS,
};
use futures::channel::mpsc::{self, UnboundedSender};
use futures::{SinkExt, StreamExt};
use gloo_net::websocket::futures::WebSocket;
use gloo_net::websocket::Message;
use gloo_timers::future::TimeoutFuture;
use wasm_bindgen_futures::spawn_local;

use crate::api;
use crate::config::Config;

#[derive(Default)]
struct Link {
    hub: RefCell<Hub>,
    outbox: RefCell<Option<UnboundedSender<String>>>,
    started: Cell<bool>,
    /// Bumped on every new connection; stale heartbeat loops stop on mismatch.
    epoch: Cell<u64>,
}

thread_local! {
    static LINK: Link = Link::default();
}

impl Link {
    fn send(&self, frame: Frame) {
        if let Some(tx) = self.outbox.borrow().as_ref() {
            if tx.unbounded_send(frame.encode()).is_err() {
                log::debug!("realtime socket closed; {} frame deferred", frame.event);
            }
        }
    }
}

/// Change feed over the realtime websocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct Realtime;

impl ChangeFeed for Realtime {
    fn watch(&self, watch: Watch, on_change: Handler) -> Subscription {
        let token = api::access_token();
        let joined = LINK.try_with(|link| {
            let (id, frame) = link.hub.borrow_mut().join(watch, on_change, token.as_deref());
            link.send(frame);
            if !link.started.replace(true) {
                spawn_local(run());
            }
            id
        });
        match joined {
            Ok(id) => Subscription::new(move || {
                let _ = LINK.try_with(|link| {
                    let leave = link.hub.borrow_mut().leave(id);
                    if let Some(frame) = leave {
                        link.send(frame);
                    }
                });
            }),
            Err(_) => Subscription::inert(),
        }
    }
}

impl Realtime {
    /// Pushes a renewed access token to the live channels. Reconnects read the
    /// stored session, so a closed socket needs nothing here.
    pub fn renew_token(token: &str) {
        let _ = LINK.try_with(|link| {
            let frames = link.hub.borrow_mut().access_token(token);
            for frame in frames {
                link.send(frame);
            }
        });
    }
}

/// Connection loop. Joins every live watch on each (re)connect.
async fn run() {
    let url = Config::get().realtime_url();
    loop {
        match WebSocket::open(&url) {
            Ok(socket) => {
                log::info!("realtime connected");
                serve(socket).await;
                log::warn!("realtime connection lost; retrying in {RECONNECT_SECS}s");
            }
            Err(e) => log::warn!("realtime connect failed: {e}; retrying in {RECONNECT_SECS}s"),
        }
        let _ = LINK.try_with(|link| link.outbox.borrow_mut().take());
        TimeoutFuture::new(RECONNECT_SECS * 1_000).await;
    }
}

async fn serve(socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded::<String>();

    let token = api::access_token();
    let Ok(epoch) = LINK.try_with(|link| {
        let rejoin = link.hub.borrow_mut().rejoin(token.as_deref());
        for frame in rejoin {
            let _ = tx.unbounded_send(frame.encode());
        }
        *link.outbox.borrow_mut() = Some(tx);
        link.epoch.set(link.epoch.get() + 1);
        link.epoch.get()
    }) else {
        return;
    };

    spawn_local(async move {
        while let Some(text) = rx.next().await {
            if let Err(e) = sink.send(Message::Text(text)).await {
                log::warn!("realtime send failed: {e}");
                break;
            }
        }
    });

    spawn_local(heartbeat(epoch));

    while let Some(incoming) = stream.next().await {
        match incoming {
            Ok(Message::Text(text)) => dispatch(&text),
            Ok(Message::Bytes(_)) => {}
            Err(e) => {
                log::warn!("realtime read failed: {e}");
                break;
            }
        }
    }
}

async fn heartbeat(epoch: u64) {
    loop {
        TimeoutFuture::new(HEARTBEAT_SECS * 1_000).await;
        let alive = LINK
            .try_with(|link| {
                if link.epoch.get() != epoch || link.outbox.borrow().is_none() {
                    return false;
                }
                let frame = link.hub.borrow_mut().heartbeat();
                link.send(frame);
                true
            })
            .unwrap_or(false);
        if !alive {
            break;
        }
    }
}

fn dispatch(text: &str) {
    let frame = match Frame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            log::debug!("ignoring unreadable realtime frame: {e}");
            return;
        }
    };
    if let Some(status) = frame.reply_status() {
        if status != "ok" {
            log::warn!("realtime {} replied {status}", frame.topic);
        }
        return;
    }
    let routed = LINK
        .try_with(|link| link.hub.borrow().route(&frame))
        .unwrap_or_default();
    for (handler, change) in routed {
        handler(&change);
    }
}
