use std::{net::Ipv4Addr, sync::Arc, time::Duration};

use chrono::Utc;

use crate::{
    agents::{Agent, ControlFlow, Followup, Replies},
    app::CliState,
    error::ShellError,
    machine::{resolve_path, FsError, Role},
    network::Host,
    world::World,
};

use super::{connect, required, Args, Outcome, Tool};

#[derive(Debug, PartialEq, Eq)]
struct Url {
    host: String,
    port: u16,
    path: String,
}

fn parse_url(raw: &str) -> Result<Url, ShellError> {
    let bad = || ShellError::invalid("curl", format!("(3) URL using bad/illegal format or missing URL: {}", raw));
    let (rest, default_port) = if let Some(rest) = raw.strip_prefix("http://") {
        (rest, 80)
    } else if let Some(rest) = raw.strip_prefix("https://") {
        (rest, 443)
    } else if raw.contains("://") {
        return Err(ShellError::invalid("curl", format!("(1) Protocol not supported: {}", raw)));
    } else {
        (raw, 80)
    };
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    let path = path.split(['?', '#']).next().unwrap_or("/");
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().map_err(|_| bad())?),
        None => (authority, default_port),
    };
    if host.is_empty() {
        return Err(bad());
    }
    Ok(Url {
        host: host.into(),
        port,
        path: path.into(),
    })
}

fn content_type(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("html" | "htm") => "text/html",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        _ => "application/octet-stream",
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Unknown",
    }
}

struct Response {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl Response {
    fn ok(path: &str, body: String) -> Self {
        Self {
            status: 200,
            content_type: content_type(path),
            body,
        }
    }

    /// The error page web servers send.
    fn page(status: u16, server: &str) -> Self {
        let title = format!("{} {}", status, reason(status));
        Self {
            status,
            content_type: "text/html",
            body: format!(
                concat!(
                    "<html>\n<head><title>{t}</title></head>\n<body>\n",
                    "<center><h1>{t}</h1></center>\n<hr><center>{s}</center>\n</body>\n</html>\n",
                ),
                t = title,
                s = server
            ),
        }
    }

    fn json_error(status: u16, msg: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: format!("{{\"error\": \"{}\"}}\n", msg),
        }
    }
}

/// Answer a request the way `host`'s web server would. Everything is served as the guest user.
fn respond(world: &World, host: &Host, method: &str, path: &str) -> Response {
    let web = &host.http;
    let root = web.root.trim_end_matches('/');
    // normalized first, so `..` can't climb out of the web root
    let clean = resolve_path(path, "/");
    let read = |rel: &str| world.vfs.read_file(&host.id, &format!("{}{}", root, rel), Role::Guest);
    match method {
        "GET" => {
            let target = if path.ends_with('/') && clean != "/" {
                format!("{}/index.html", clean)
            } else if clean == "/" {
                "/index.html".to_string()
            } else {
                clean
            };
            let res = match read(&target) {
                Err(FsError::IsADirectory) => read(&format!("{}/index.html", target)).map_err(|e| match e {
                    FsError::NotFound => FsError::PermissionDenied,
                    e => e,
                }),
                res => res,
            };
            match res {
                Ok(body) => Response::ok(&target, body),
                Err(FsError::PermissionDenied) => Response::page(403, &web.server),
                Err(_) => Response::page(404, &web.server),
            }
        }
        "POST" => {
            let endpoint = clean
                .strip_prefix("/api/")
                .filter(|name| !name.is_empty() && !name.contains('/'));
            match endpoint.map(|name| read(&format!("/api/{}.json", name))) {
                Some(Ok(body)) => Response::ok(".json", body),
                _ => Response::json_error(400, "Invalid API endpoint"),
            }
        }
        _ => Response::page(405, &web.server),
    }
}

struct Request {
    world: Arc<World>,
    url: Url,
    ip: Ipv4Addr,
    method: String,
    include_headers: bool,
    delay: Duration,
}

impl Request {
    fn headers(&self, host: &Host, res: &Response, replies: &mut Replies) {
        replies.output(format!("HTTP/1.1 {} {}", res.status, reason(res.status)));
        replies.output(format!("Date: {}", Utc::now().format("%a, %d %b %Y %H:%M:%S GMT")));
        replies.output(format!("Server: {}", host.http.server));
        replies.output(format!("Content-Type: {}", res.content_type));
        replies.output(format!("Content-Length: {}", res.body.len()));
        replies.output("Connection: close");
        for (name, value) in &host.http.headers {
            replies.output(format!("{}: {}", name, value));
        }
        replies.output("");
    }
}

impl Agent for Request {
    fn start(&mut self, _replies: &mut Replies) -> ControlFlow {
        ControlFlow::sleep_for(self.delay)
    }

    fn react(&mut self, replies: &mut Replies) -> ControlFlow {
        let host = match connect(&self.world, "curl", self.ip, self.url.port) {
            Ok((host, port)) if matches!(port.service.as_str(), "http" | "https") => host,
            Ok(_) => {
                replies.error("curl: (1) Received HTTP/0.9 when not allowed");
                return ControlFlow::Kill;
            }
            Err(e) => {
                replies.error(e.to_string());
                return ControlFlow::Kill;
            }
        };
        let res = respond(&self.world, host, &self.method, &self.url.path);
        if self.include_headers {
            self.headers(host, &res, replies);
        }
        replies.block(&res.body);
        ControlFlow::Resolve(Followup::Http {
            status: res.status,
            body: res.body,
        })
    }
}

/// `curl [-i] [-X method] <url>`
pub struct Curl;

impl Tool for Curl {
    fn name(&self) -> &'static str {
        "curl"
    }

    fn usage(&self) -> &'static str {
        "curl [-i] [-X method] <url>"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("curl", raw, "isv", "X")?;
        let url = parse_url(required(&args, self)?)?;
        let method = args.value('X').unwrap_or("GET").trim().to_ascii_uppercase();
        let ip = state.registry().lookup(&url.host).ok_or_else(|| ShellError::NameResolution {
            cmd: "curl",
            name: url.host.clone(),
        })?;
        Ok(state.spawn(Request {
            world: state.world.clone(),
            url,
            ip,
            method,
            include_headers: args.flag('i'),
            delay: state.latency.http(),
        }))
    }
}

#[cfg(test)]
mod test {
    use crate::tools::testing::{args, drive, error, local};

    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    #[test]
    fn cancelled_before_response() {
        let state = local(Role::User);
        let out = match Curl.run(&args(&["http://192.168.1.50/"]), &state) {
            Ok(Outcome::Async(out)) => out,
            _ => panic!("curl should be async"),
        };
        let (tx, rx) = crossbeam::channel::unbounded();
        let tx2 = tx.clone();
        let running = out.start(
            move |l| tx.send(Some(l.text)).expect("open"),
            move |_| tx2.send(None).expect("open"),
        );
        running.cancel();
        assert_eq!(state.sched.pending(), 0);
        mock_instant::MockClock::advance(Duration::from_secs(10));
        state.sched.run_due();
        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(seen, Vec::<Option<String>>::new());
    }

    fn status_of(done: &crate::tools::testing::Finished) -> u16 {
        match &done.followup {
            Some(Some(Followup::Http { status, .. })) => *status,
            other => panic!("no HTTP response: {:?}", other),
        }
    }

    #[test]
    fn urls() {
        assert_eq!(
            parse_url("http://www.megacorp.local:8080/api/users?x=1").expect("valid"),
            Url {
                host: "www.megacorp.local".into(),
                port: 8080,
                path: "/api/users".into(),
            }
        );
        assert_eq!(parse_url("https://10.0.0.5").expect("valid").port, 443);
        assert_eq!(parse_url("10.0.0.5").expect("valid").path, "/");
        assert!(parse_url("gopher://x").is_err());
        assert!(parse_url("http://:80/").is_err());
    }

    #[test]
    fn get_index() {
        let state = local(Role::User);
        let done = drive(&Curl, &["http://192.168.1.50/"], &state, TICK);
        assert_eq!(status_of(&done), 200);
        assert_eq!(done.texts()[0], "<!DOCTYPE html>");
        assert_eq!(done.steps, 5);
    }

    #[test]
    fn post_to_api_returns_json_file() {
        let state = local(Role::User);
        let expected = state
            .vfs()
            .read_file(&"webserver".into(), "/var/www/api/users.json", Role::Guest)
            .expect("exists");
        let done = drive(&Curl, &["http://192.168.1.50/api/users", "-X POST"], &state, TICK);
        match done.followup {
            Some(Some(Followup::Http { status, body })) => {
                assert_eq!(status, 200);
                assert_eq!(body, expected);
            }
            other => panic!("no HTTP response: {:?}", other),
        }
    }

    #[test]
    fn post_elsewhere_is_rejected() {
        let state = local(Role::User);
        let done = drive(&Curl, &["-X", "post", "http://192.168.1.50/login"], &state, TICK);
        assert_eq!(status_of(&done), 400);
        assert!(done.texts()[0].contains("Invalid API endpoint"));
        let done = drive(&Curl, &["-X", "POST", "http://192.168.1.50/api/missing"], &state, TICK);
        assert_eq!(status_of(&done), 400);
    }

    #[test]
    fn missing_pages_are_404() {
        let state = local(Role::User);
        let done = drive(&Curl, &["http://192.168.1.50/nope.html"], &state, TICK);
        assert_eq!(status_of(&done), 404);
        assert!(done.texts().contains(&"<center><h1>404 Not Found</h1></center>"));
        let done = drive(&Curl, &["http://192.168.1.50/../../root/flag.txt"], &state, TICK);
        assert_eq!(status_of(&done), 404);
        let done = drive(&Curl, &["-X", "DELETE", "http://192.168.1.50/"], &state, TICK);
        assert_eq!(status_of(&done), 405);
    }

    #[test]
    fn include_headers() {
        let state = local(Role::User);
        let done = drive(&Curl, &["-i", "http://www.megacorp.local/api/status.json"], &state, TICK);
        let texts = done.texts();
        assert_eq!(texts[0], "HTTP/1.1 200 OK");
        assert!(texts[1].starts_with("Date: "));
        assert_eq!(texts[2], "Server: nginx/1.18.0 (Ubuntu)");
        assert_eq!(texts[3], "Content-Type: application/json");
        assert!(texts[4].starts_with("Content-Length: "));
        assert_eq!(texts[5], "Connection: close");
        assert!(texts.contains(&"X-Powered-By: PHP/7.4.3"));
        let blank = texts.iter().position(|t| t.is_empty()).expect("blank line after headers");
        assert!(texts[blank + 1].starts_with("{\"status\": \"ok\""));
    }

    #[test]
    fn connection_errors() {
        let state = local(Role::User);
        let done = drive(&Curl, &["http://10.0.0.5/"], &state, TICK);
        assert_eq!(
            done.texts(),
            vec!["curl: connect to host 10.0.0.5 port 80: Connection refused"]
        );
        assert_eq!(done.followup, Some(None));
        let done = drive(&Curl, &["http://192.168.1.50:22/"], &state, TICK);
        assert!(done.lines[0].is_error());
        assert_eq!(error(&Curl, &["http://nowhere/"], &state), "curl: nowhere: Name or service not known");
    }
}
