use micro_envelope::envelope::Message;
use micro_envelope::protocol::{HttpRequest, HttpResponse};
use micro_route::Server;
use micro_route::negotiate::negotiate;

fn hello_world(request: HttpRequest) {
    let producible = [mime::TEXT_PLAIN_UTF_8, mime::APPLICATION_JSON];
    let (content_type, body) = match negotiate(&request, &producible) {
        Some(m) if *m == mime::APPLICATION_JSON => (m, r#"{"hello":"world"}"#.to_owned()),
        Some(m) => (m, "hello world\n".to_owned()),
        None => {
            let response = HttpResponse::new(http::StatusCode::NOT_ACCEPTABLE);
            response.content_length(0);
            request.reply(response.clone());
            response.complete();
            return;
        }
    };

    let response = HttpResponse::ok();
    response.content_type(content_type.as_ref()).content_length(body.len() as u64);
    request.reply(response.clone());
    drop(response.write(body));
    response.complete();
}

fn greet(request: HttpRequest) {
    let name = request.path_param("name").unwrap_or_default();
    let body = format!("hello {name}\n");

    let response = HttpResponse::ok();
    response.content_type("text/plain").content_length(body.len() as u64);
    request.reply(response.clone());
    drop(response.write(body));
    response.complete();
}

#[tokio::main]
async fn main() {
    Server::builder()
        .address("127.0.0.1:3000")
        .route("/", hello_world)
        .route("/hello/{name}", greet)
        .build()
        .unwrap()
        .start()
        .await;
}
