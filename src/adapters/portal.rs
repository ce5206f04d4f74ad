//! Configuration portal adapter.
//!
//! Implements [`PortalPort`]: a small JSON-over-HTTP interface served on
//! the configuration access point.
//!
//! | Route          | Method | Body                          | Request            |
//! |----------------|--------|-------------------------------|--------------------|
//! | `/`            | GET    | -                             | (setup page)       |
//! | `/scan`        | GET    | -                             | `Scan`             |
//! | `/connect`     | POST   | `{"ssid", "password"}`        | `Connect`          |
//! | `/clear`       | POST   | -                             | `EraseCredentials` |
//! | `/setpassword` | POST   | `{"controlPassword"}`         | `SetSecret`        |
//!
//! The HTTP server runs on its own task.  Each handler decodes its body
//! into a [`PortalRequest`], hands it to the control loop, and waits for
//! the matching [`PortalResponse`].  On hosts the HTTP side is replaced by
//! [`PortalAdapter::submit`] / [`PortalAdapter::take_responses`].

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::commands::{PortalRequest, PortalResponse};
use crate::app::ports::PortalPort;

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

// ───────────────────────────────────────────────────────────────
// Wire format
// ───────────────────────────────────────────────────────────────

/// Portal endpoints that carry a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Scan,
    Connect,
    Clear,
    SetPassword,
}

#[derive(Deserialize)]
struct ConnectBody {
    ssid: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct SetPasswordBody {
    #[serde(rename = "controlPassword")]
    control_password: String,
}

#[derive(Serialize)]
struct NetworkEntry<'a> {
    ssid: &'a str,
    rssi: i8,
}

#[derive(Serialize)]
struct Outcome<'a> {
    success: bool,
    message: &'a str,
}

/// Decode an HTTP body into a portal request.
pub fn decode_request(route: Route, body: &[u8]) -> Result<PortalRequest, &'static str> {
    match route {
        Route::Scan => Ok(PortalRequest::Scan),
        Route::Clear => Ok(PortalRequest::EraseCredentials),
        Route::Connect => {
            let body: ConnectBody = serde_json::from_slice(body).map_err(|_| "Invalid request")?;
            Ok(PortalRequest::Connect {
                ssid: body.ssid,
                passphrase: body.password,
            })
        }
        Route::SetPassword => {
            let body: SetPasswordBody =
                serde_json::from_slice(body).map_err(|_| "Invalid request")?;
            Ok(PortalRequest::SetSecret {
                secret: body.control_password,
            })
        }
    }
}

/// Encode a portal response as the JSON body sent back to the browser.
pub fn encode_response(response: &PortalResponse) -> Vec<u8> {
    let encoded = match response {
        PortalResponse::Networks(networks) => {
            let entries: Vec<NetworkEntry<'_>> = networks
                .iter()
                .map(|n| NetworkEntry {
                    ssid: n.ssid.as_str(),
                    rssi: n.rssi,
                })
                .collect();
            serde_json::to_vec(&entries)
        }
        PortalResponse::Success(message) => serde_json::to_vec(&Outcome {
            success: true,
            message,
        }),
        PortalResponse::Failure(message) => serde_json::to_vec(&Outcome {
            success: false,
            message,
        }),
    };
    encoded.unwrap_or_else(|e| {
        warn!("Portal: response encode failed: {}", e);
        br#"{"success":false}"#.to_vec()
    })
}

// ───────────────────────────────────────────────────────────────
// Device backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod device {
    use std::time::{Duration, Instant};

    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::channel::Channel;
    use esp_idf_svc::io::{Read, Write};
    use esp_idf_svc::http::Method;
    use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};

    use super::{Route, decode_request, encode_response};
    use crate::app::commands::{PortalRequest, PortalResponse};

    /// Requests: HTTP task → control loop.
    pub(super) static REQUESTS: Channel<CriticalSectionRawMutex, PortalRequest, 1> = Channel::new();
    /// Responses: control loop → HTTP task.
    pub(super) static RESPONSES: Channel<CriticalSectionRawMutex, PortalResponse, 1> =
        Channel::new();

    /// Longest a handler waits for the control loop (a network test takes
    /// up to the full join budget).
    const RESPONSE_WAIT: Duration = Duration::from_secs(15);
    const MAX_BODY: usize = 512;

    const SETUP_PAGE: &str = include_str!("portal.html");

    pub(super) fn start_server() -> anyhow::Result<EspHttpServer<'static>> {
        let conf = Configuration {
            stack_size: 10 * 1024,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&conf)?;

        server.fn_handler::<anyhow::Error, _>("/", Method::Get, |req| {
            req.into_response(200, Some("OK"), &[("Content-Type", "text/html; charset=utf-8")])?
                .write_all(SETUP_PAGE.as_bytes())?;
            Ok(())
        })?;
        for (path, method, route) in [
            ("/scan", Method::Get, Route::Scan),
            ("/connect", Method::Post, Route::Connect),
            ("/clear", Method::Post, Route::Clear),
            ("/setpassword", Method::Post, Route::SetPassword),
        ] {
            server.fn_handler::<anyhow::Error, _>(path, method, move |req| handle(req, route))?;
        }
        Ok(server)
    }

    fn handle(mut req: Request<&mut EspHttpConnection<'_>>, route: Route) -> anyhow::Result<()> {
        let mut body = [0u8; MAX_BODY];
        let mut len = 0;
        while len < body.len() {
            let n = req.read(&mut body[len..])?;
            if n == 0 {
                break;
            }
            len += n;
        }

        let response = match decode_request(route, &body[..len]) {
            Ok(request) => exchange(request),
            Err(message) => PortalResponse::Failure(message),
        };
        req.into_response(
            200,
            Some("OK"),
            &[("Content-Type", "application/json; charset=utf-8")],
        )?
        .write_all(&encode_response(&response))?;
        Ok(())
    }

    /// Hand one request to the control loop and wait for its answer.
    fn exchange(request: PortalRequest) -> PortalResponse {
        while RESPONSES.try_receive().is_ok() {}
        if REQUESTS.try_send(request).is_err() {
            return PortalResponse::Failure("Busy");
        }
        let started = Instant::now();
        while started.elapsed() < RESPONSE_WAIT {
            if let Ok(response) = RESPONSES.try_receive() {
                return response;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        PortalResponse::Failure("Timed out")
    }
}

#[cfg(target_os = "espidf")]
pub struct PortalAdapter {
    server: Option<esp_idf_svc::http::server::EspHttpServer<'static>>,
}

#[cfg(target_os = "espidf")]
impl PortalAdapter {
    pub fn new() -> Self {
        Self { server: None }
    }
}

#[cfg(target_os = "espidf")]
impl PortalPort for PortalAdapter {
    fn start(&mut self) {
        if self.server.is_some() {
            return;
        }
        match device::start_server() {
            Ok(server) => {
                info!("Portal: serving");
                self.server = Some(server);
            }
            Err(e) => warn!("Portal: HTTP server failed to start: {}", e),
        }
    }

    fn stop(&mut self) {
        if self.server.take().is_some() {
            while device::REQUESTS.try_receive().is_ok() {}
            info!("Portal: stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.server.is_some()
    }

    fn take_request(&mut self) -> Option<PortalRequest> {
        device::REQUESTS.try_receive().ok()
    }

    fn respond(&mut self, response: PortalResponse) {
        if device::RESPONSES.try_send(response).is_err() {
            warn!("Portal: response dropped, previous one unread");
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct PortalAdapter {
    active: bool,
    requests: VecDeque<PortalRequest>,
    responses: Vec<PortalResponse>,
}

#[cfg(not(target_os = "espidf"))]
impl PortalAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request as if a browser had sent it.  Refused while the
    /// portal is down.
    pub fn submit(&mut self, request: PortalRequest) -> bool {
        if !self.active {
            return false;
        }
        self.requests.push_back(request);
        true
    }

    pub fn take_responses(&mut self) -> Vec<PortalResponse> {
        core::mem::take(&mut self.responses)
    }
}

#[cfg(not(target_os = "espidf"))]
impl PortalPort for PortalAdapter {
    fn start(&mut self) {
        if !self.active {
            info!("Portal(sim): serving");
            self.active = true;
        }
    }

    fn stop(&mut self) {
        if self.active {
            info!("Portal(sim): stopped");
            self.active = false;
            self.requests.clear();
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn take_request(&mut self) -> Option<PortalRequest> {
        if !self.active {
            return None;
        }
        self.requests.pop_front()
    }

    fn respond(&mut self, response: PortalResponse) {
        self.responses.push(response);
    }
}
