//! Stores `PUT /files/{name}` bodies in the temp directory and serves them back on
//! `GET /files/{name}`.
//!
//! ```sh
//! curl -T Cargo.toml http://127.0.0.1:3000/files/manifest
//! curl http://127.0.0.1:3000/files/manifest
//! ```

use std::path::PathBuf;

use futures::StreamExt;
use http::{Method, StatusCode};
use micro_envelope::envelope::Message;
use micro_envelope::file::AsyncFile;
use micro_envelope::protocol::{HttpRequest, HttpResponse};
use micro_route::Server;
use tracing::{info, warn};

fn storage_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("micro-route-{name}"))
}

fn empty_reply(request: &HttpRequest, status: StatusCode) {
    let response = HttpResponse::new(status);
    response.content_length(0);
    request.reply(response.clone());
    response.complete();
}

fn files(request: HttpRequest) {
    let Some(name) = request.path_param("name").filter(|name| !name.is_empty()) else {
        empty_reply(&request, StatusCode::BAD_REQUEST);
        return;
    };
    let path = storage_path(&name);

    match *request.method() {
        Method::PUT => {
            // subscribe before returning so no chunk is missed
            let body = request.subscribe();
            tokio::spawn(store(request, body, path));
        }
        Method::GET => {
            tokio::spawn(fetch(request, path));
        }
        _ => empty_reply(&request, StatusCode::METHOD_NOT_ALLOWED),
    }
}

async fn store(request: HttpRequest, mut body: micro_envelope::envelope::InboundBody, path: PathBuf) {
    let file = match AsyncFile::overwrite(&path).await {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), cause = %e, "can't open upload target");
            empty_reply(&request, StatusCode::INTERNAL_SERVER_ERROR);
            return;
        }
    };

    while let Some(chunk) = body.next().await {
        drop(file.write(chunk));
    }

    let stored = file.clone();
    file.on_complete(move || {
        info!(path = %stored.path().display(), size = stored.position(), "upload stored");
        empty_reply(&request, StatusCode::CREATED);
    });
    if let Err(e) = file.close(false).await {
        warn!(path = %path.display(), cause = %e, "closing upload failed");
    }
}

async fn fetch(request: HttpRequest, path: PathBuf) {
    let Ok(metadata) = tokio::fs::metadata(&path).await else {
        empty_reply(&request, StatusCode::NOT_FOUND);
        return;
    };

    let response = HttpResponse::ok();
    response.content_type("application/octet-stream").content_length(metadata.len());
    request.reply(response.clone());
    drop(response.write(path));
    response.complete();
}

#[tokio::main]
async fn main() {
    Server::builder().address("127.0.0.1:3000").route("/files/{name}", files).build().unwrap().start().await;
}
