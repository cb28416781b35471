use std::io::Read as _;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

/// One request the stub received.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub body: String,
}

/// Spreadsheet web-app stand-in serving a two-book catalog ("Gita" and
/// "Nitai Charitra") and accepting every POST.
pub struct SheetStub {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

fn catalog() -> Value {
    json!({
        "books": [
            { "BookID": "B1", "Title": "Gita", "CoverImageUrl": "", "Category": "Scripture" },
            { "BookID": "B2", "Title": "Nitai Charitra", "CoverImageUrl": "", "Category": "Biography" }
        ]
    })
}

fn book_data(book_id: &str) -> Option<Value> {
    match book_id {
        "B1" => Some(json!({
            "index": [
                { "BookID": "B1", "PageID": "P1", "PageTitle": "Chapter 1" },
                { "BookID": "B1", "PageID": "P2", "PageTitle": "Chapter 2" }
            ],
            "pages": [
                { "BookID": "B1", "PageID": "P1", "PageTitle": "Chapter 1", "PageText": "Arjuna said" }
            ]
        })),
        "B2" => Some(json!({ "index": [], "pages": [] })),
        _ => None,
    }
}

fn kirtans() -> Value {
    json!({
        "data": [
            { "Name": "Gopal \"Ji\"", "Address": "Sector 5", "PhoneNumber": 9540917385_u64, "City": "Noida", "State": "Uttar Pradesh", "Country": "India", "Timings": "6 PM" },
            { "Name": "Shyam", "Address": "", "PhoneNumber": "", "City": "Pune", "State": "", "Country": "India", "Timings": "" },
            { "Name": "Radha", "Address": "", "PhoneNumber": "", "City": "Agra", "State": "Uttar Pradesh", "Country": "India", "Timings": "" }
        ]
    })
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

impl SheetStub {
    pub fn spawn() -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start sheet stub server");
        let base_url = format!("http://{}", server.server_addr());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                let method = request.method().to_string();
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                seen.lock().unwrap().push(Recorded {
                    method: method.clone(),
                    url: url.clone(),
                    body,
                });

                let path = url.split('?').next().unwrap_or(&url).to_string();
                let (status, body) = if method == "POST" {
                    (200, json!({ "success": true }))
                } else {
                    match (path.as_str(), query_param(&url, "action").as_deref()) {
                        ("/books", Some("getBooks")) => (200, catalog()),
                        ("/books", Some("getBookData")) => {
                            match query_param(&url, "bookId").and_then(|id| book_data(&id)) {
                                Some(data) => (200, data),
                                None => (404, json!({ "error": "unknown book" })),
                            }
                        }
                        ("/kirtans", _) => (200, kirtans()),
                        _ => (404, json!({ "error": "not found" })),
                    }
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(body.to_string())
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Points every endpoint of a `kripadham` command at this stub.
    pub fn configure(&self, cmd: &mut assert_cmd::Command) {
        for (key, path) in [
            ("KRIPADHAM_BOOKS_URL", "/books"),
            ("KRIPADHAM_DEVOTEES_URL", "/devotees"),
            ("KRIPADHAM_KIRTANS_URL", "/kirtans"),
            ("KRIPADHAM_BHAJANS_URL", "/bhajans"),
            ("KRIPADHAM_KATHAS_URL", "/kathas"),
            ("KRIPADHAM_STORE_URL", "/store"),
            ("KRIPADHAM_EVENT_URL", "/event"),
        ] {
            cmd.env(key, format!("{}{path}", self.base_url));
        }
        cmd.env("KRIPADHAM_STAGE_WAIT_MS", "10000");
        cmd.env_remove("RUST_LOG");
    }

    #[allow(dead_code)]
    pub fn posts(&self) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == "POST")
            .cloned()
            .collect()
    }
}

impl Drop for SheetStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
