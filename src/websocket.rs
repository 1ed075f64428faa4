/// WebSocket transport for grid views
///
/// Each connection is one view of its own `GridWidget`, seeded from the
/// server's dataset and config. Text frames are handed to the widget; the
/// messages it produces are flushed back to the socket after each frame.
use actix::prelude::*;
use actix_web_actors::ws;
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

use crate::column::{Column, Value};
use crate::config::GridConfig;
use crate::error::Result;
use crate::messages::Outbox;
use crate::table::Dataset;
use crate::widget::GridWidget;

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state for all WebSocket connections
pub struct AppState {
    pub dataset: Dataset,
    pub config: GridConfig,
}

impl AppState {
    pub fn new(dataset: Dataset, config: GridConfig) -> Self {
        Self { dataset, config }
    }

    /// State serving a small demo dataset.
    pub fn demo(config: GridConfig) -> Result<Self> {
        let names = ["Alice", "Bob", "Carol", "Dave", "Erin", "Frank"];
        let dataset = Dataset::builder()
            .column(Column::new("name", names.iter().map(|n| Value::from(*n)).collect()))
            .column(Column::new(
                "value",
                vec![100.5, 200.75, 50.0, 75.25, 310.0, 12.5]
                    .into_iter()
                    .map(Value::Float)
                    .collect(),
            ))
            .column(Column::new(
                "active",
                [true, false, true, true, false, true].into_iter().map(Value::Bool).collect(),
            ))
            .column(Column::categorical(
                "team",
                ["red", "blue", "red", "green", "blue", "red"]
                    .into_iter()
                    .map(Value::from)
                    .collect(),
                vec![Value::from("red"), Value::from("green"), Value::from("blue")],
            ))
            .build()?;
        Ok(Self::new(dataset, config))
    }
}

/// WebSocket connection actor
pub struct GridWebSocket {
    hb: Instant,
    state: actix_web::web::Data<AppState>,
    outbox: Outbox,
    widget: Option<GridWidget>,
}

impl GridWebSocket {
    pub fn new(state: actix_web::web::Data<AppState>) -> Self {
        Self {
            hb: Instant::now(),
            state,
            outbox: Outbox::new(),
            widget: None,
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("WebSocket client heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// Write every pending widget message to the socket.
    fn flush(&self, ctx: &mut ws::WebsocketContext<Self>) {
        for message in self.outbox.drain() {
            match serde_json::to_string(&message) {
                Ok(text) => ctx.text(text),
                Err(e) => error!("Failed to encode '{}' message: {}", message.kind(), e),
            }
        }
    }
}

impl Actor for GridWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
        match GridWidget::with_config(self.state.dataset.clone(), self.state.config.clone(), self.outbox.clone()) {
            Ok(widget) => {
                info!("Grid widget {} connected", widget.id());
                self.widget = Some(widget);
                self.flush(ctx);
            }
            Err(e) => {
                error!("Failed to create grid widget: {}", e);
                ctx.stop();
            }
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(widget) = &self.widget {
            info!("Grid widget {} disconnected", widget.id());
        }
    }
}

impl StreamHandler<std::result::Result<ws::Message, ws::ProtocolError>> for GridWebSocket {
    fn handle(&mut self, msg: std::result::Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                if let Some(widget) = self.widget.as_mut() {
                    widget.handle_text(&text);
                }
                self.flush(ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                debug!("Unexpected binary message");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => ctx.stop(),
        }
    }
}
