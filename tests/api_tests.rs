//! HTTP 接口集成测试: 内存存储 + 假模型客户端, 无需数据库和网络

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`
use tributo_justo::{
    auth::JwtKeys,
    build_router,
    db::MemoryRepository,
    service::ChatCompletion,
    AppError, AppState,
};

const BOUNDARY: &str = "----tributo-boundary";
const HEADER: &str = "cnpj;razao_social;numero_nota;data_emissao;codigo_item;descricao_item;quantidade;valor_unitario;imposto_item\n";

/// 固定回复的模型客户端
struct FakeChat {
    status: Option<u16>,
    reply: String,
}

#[async_trait]
impl ChatCompletion for FakeChat {
    async fn complete(&self, _system: &str, user: &str) -> tributo_justo::Result<String> {
        match self.status {
            Some(status) => Err(AppError::Upstream { status, body: self.reply.clone() }),
            None => Ok(format!("{} ({} bytes)", self.reply, user.len())),
        }
    }
}

fn setup_app_with(chat: FakeChat) -> Router {
    let repo = Arc::new(MemoryRepository::new());
    let state = AppState::new(
        repo.clone(),
        repo,
        Arc::new(chat),
        JwtKeys::new(b"test-key", 3600),
    );
    build_router(state)
}

fn setup_app() -> Router {
    setup_app_with(FakeChat { status: None, reply: "Análise".to_string() })
}

fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn upload_request(field: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"notas.csv\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = field,
        c = content
    );
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}

async fn extract_json(body: Body) -> Value {
    serde_json::from_slice(&body_bytes(body).await).expect("Should parse JSON")
}

async fn extract_text(body: Body) -> String {
    String::from_utf8(body_bytes(body).await).expect("Should be UTF-8")
}

/// 注册并登录, 返回令牌
async fn login(app: &Router) -> String {
    let creds = json!({ "username": "ana", "password": "s3nha" });
    let resp = app.clone().oneshot(json_request("POST", "/auth/register", creds.clone(), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.clone().oneshot(json_request("POST", "/auth/login", creds, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = extract_json(resp.into_body()).await;
    body["token"].as_str().expect("token").to_string()
}

async fn upload(app: &Router, rows: &str) -> StatusCode {
    let content = format!("{}{}", HEADER, rows);
    app.clone().oneshot(upload_request("file", &content)).await.unwrap().status()
}

// =============================================================================
// 健康检查 / 认证
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let app = setup_app();
    let resp = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(extract_text(resp.into_body()).await, "OK");
}

#[tokio::test]
async fn test_register_then_login_returns_token() {
    let app = setup_app();
    let creds = json!({ "username": "ana", "password": "s3nha" });

    let resp = app.clone().oneshot(json_request("POST", "/auth/register", creds.clone(), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(extract_text(resp.into_body()).await, "Usuário registrado com sucesso.");

    let resp = app.clone().oneshot(json_request("POST", "/auth/login", creds, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = extract_json(resp.into_body()).await;
    assert!(!body["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_accepts_pascal_case_fields() {
    let app = setup_app();
    let _ = login(&app).await;
    let creds = json!({ "Username": "ana", "Password": "s3nha" });
    let resp = app.oneshot(json_request("POST", "/auth/login", creds, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_unregistered_is_unauthorized_without_detail() {
    let app = setup_app();
    let creds = json!({ "username": "ninguem", "password": "x" });
    let resp = app.oneshot(json_request("POST", "/auth/login", creds, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(body_bytes(resp.into_body()).await.is_empty());
}

#[tokio::test]
async fn test_duplicate_register_is_bad_request() {
    let app = setup_app();
    let _ = login(&app).await;
    let creds = json!({ "username": "ana", "password": "outra" });
    let resp = app.oneshot(json_request("POST", "/auth/register", creds, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_routes_require_valid_token() {
    let app = setup_app();
    for uri in ["/relatorio", "/alertas", "/estatisticas"] {
        let resp = app.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{} without token", uri);

        let resp = app.clone().oneshot(get(uri, Some("forjado"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{} with bad token", uri);
    }

    let foreign = JwtKeys::new(b"outra-chave", 3600).issue("ana").unwrap();
    let resp = app.clone().oneshot(get("/estatisticas", Some(&foreign))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .oneshot(json_request("POST", "/relatorio/interpretar", json!({ "pergunta": "?" }), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// 上传 + 统计
// =============================================================================

#[tokio::test]
async fn test_two_row_invoice_round_trip() {
    let app = setup_app();
    let token = login(&app).await;

    let status = upload(
        &app,
        "111;ACME LTDA;NF-1;2024-01-10;A1;Parafuso;10;5.00;45.00\n\
         111;ACME LTDA;NF-1;2024-01-10;A2;Porca;1;10.00;10.00\n",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let resp = app.clone().oneshot(get("/estatisticas", Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let stats = extract_json(resp.into_body()).await;
    assert_eq!(stats["totalNotas"], 1);
    assert_eq!(stats["totalItens"], 2);
    assert_eq!(stats["valorTotal"].as_f64(), Some(60.0));
    assert_eq!(stats["impostoTotal"].as_f64(), Some(55.0));
    assert_eq!(stats["mediaImpostoItem"].as_f64(), Some(27.5));

    // 差额 5.00, 不报警
    let resp = app.clone().oneshot(get("/alertas", Some(&token))).await.unwrap();
    assert_eq!(extract_json(resp.into_body()).await, json!([]));

    let resp = app.oneshot(get("/relatorio", Some(&token))).await.unwrap();
    let report = extract_json(resp.into_body()).await;
    assert_eq!(report[0]["cnpj"], "111");
    assert_eq!(report[0]["totalImpostos"].as_f64(), Some(55.0));
    assert_eq!(report[0]["mediaDiferenca"].as_f64(), Some(5.0));
}

#[tokio::test]
async fn test_invoice_and_item_counts_follow_source_rows() {
    let app = setup_app();
    let token = login(&app).await;

    let rows = "1;A;N1;2024-01-01;X;x;1;1;1\n\
                2;B;N2;2024-01-01;X;x;1;1;1\n\
                1;A;N1;2024-01-01;Y;y;1;1;1\n\
                3;C;N3;2024-01-01;X;x;1;1;1\n\
                1;A;N1;2024-01-01;Z;z;1;1;1\n";
    assert_eq!(upload(&app, rows).await, StatusCode::OK);

    let resp = app.oneshot(get("/estatisticas", Some(&token))).await.unwrap();
    let stats = extract_json(resp.into_body()).await;
    assert_eq!(stats["totalNotas"], 3);
    assert_eq!(stats["totalItens"], 5);
}

#[tokio::test]
async fn test_anomalies_exclude_exact_threshold() {
    let app = setup_app();
    let token = login(&app).await;

    let rows = "111;A;EXATO;2024-01-01;X;x;1;150.00;100.00\n\
                111;A;ACIMA;2024-01-01;X;x;2;50.00;49.99\n\
                222;B;OK;2024-01-01;X;x;1;10.00;9.00\n";
    assert_eq!(upload(&app, rows).await, StatusCode::OK);

    let resp = app.oneshot(get("/alertas", Some(&token))).await.unwrap();
    let alertas = extract_json(resp.into_body()).await;
    let alertas = alertas.as_array().unwrap();
    assert_eq!(alertas.len(), 1);
    assert_eq!(alertas[0]["numero_nota"], "ACIMA");
    assert_eq!(alertas[0]["cnpj"], "111");
    assert_eq!(alertas[0]["valorTotal"].as_f64(), Some(100.0));
    assert_eq!(alertas[0]["impostoTotal"].as_f64(), Some(49.99));
    assert_eq!(alertas[0]["diferenca"].as_f64(), Some(50.01));
}

#[tokio::test]
async fn test_report_filter_by_cnpj() {
    let app = setup_app();
    let token = login(&app).await;

    let rows = "111;A;1;2024-01-01;X;x;1;10;3\n\
                222;B;2;2024-01-01;X;x;1;10;4\n\
                111;A;3;2024-01-01;X;x;1;10;5\n";
    assert_eq!(upload(&app, rows).await, StatusCode::OK);

    let resp = app.clone().oneshot(get("/relatorio", Some(&token))).await.unwrap();
    assert_eq!(extract_json(resp.into_body()).await.as_array().unwrap().len(), 2);

    let resp = app.clone().oneshot(get("/relatorio?cnpj=111", Some(&token))).await.unwrap();
    let report = extract_json(resp.into_body()).await;
    assert_eq!(report.as_array().unwrap().len(), 1);
    assert_eq!(report[0]["cnpj"], "111");
    assert_eq!(report[0]["totalImpostos"].as_f64(), Some(8.0));
    assert_eq!(report[0]["mediaDiferenca"].as_f64(), Some(6.0));

    let resp = app.clone().oneshot(get("/relatorio?cnpj=999", Some(&token))).await.unwrap();
    assert_eq!(extract_json(resp.into_body()).await, json!([]));

    // 空参数等同于不过滤
    let resp = app.oneshot(get("/relatorio?cnpj=", Some(&token))).await.unwrap();
    assert_eq!(extract_json(resp.into_body()).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_store_statistics_are_zero() {
    let app = setup_app();
    let token = login(&app).await;

    let resp = app.oneshot(get("/estatisticas", Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let stats = extract_json(resp.into_body()).await;
    assert_eq!(stats["totalNotas"], 0);
    assert_eq!(stats["totalItens"], 0);
    assert_eq!(stats["mediaImpostoItem"].as_f64(), Some(0.0));
}

#[tokio::test]
async fn test_upload_rejects_missing_or_empty_file() {
    let app = setup_app();

    let resp = app.clone().oneshot(upload_request("file", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(extract_text(resp.into_body()).await, "Arquivo inválido.");

    // 只有普通文本字段, 没有文件
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"nome\"\r\n\r\nvalor\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_uses_first_file_field_when_not_named_file() {
    let app = setup_app();
    let token = login(&app).await;

    let content = format!("{}111;A;1;2024-01-01;X;x;1;10;3\n", HEADER);
    let resp = app.clone().oneshot(upload_request("arquivo", &content)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(extract_text(resp.into_body()).await, "Upload e processamento concluído.");

    let resp = app.oneshot(get("/estatisticas", Some(&token))).await.unwrap();
    assert_eq!(extract_json(resp.into_body()).await["totalNotas"], 1);
}

#[tokio::test]
async fn test_malformed_row_aborts_whole_upload() {
    let app = setup_app();
    let token = login(&app).await;

    let rows = "111;A;1;2024-01-01;X;x;1;10;3\n\
                111;A;2;2024-01-01;X;x;um;10;3\n";
    let content = format!("{}{}", HEADER, rows);
    let resp = app.clone().oneshot(upload_request("file", &content)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(extract_text(resp.into_body()).await.contains("linha 3"));

    let resp = app.oneshot(get("/estatisticas", Some(&token))).await.unwrap();
    assert_eq!(extract_json(resp.into_body()).await["totalNotas"], 0);
}

// =============================================================================
// 数据解读
// =============================================================================

#[tokio::test]
async fn test_interpretation_returns_summary_and_text() {
    let app = setup_app();
    let token = login(&app).await;
    assert_eq!(upload(&app, "111;A;1;2024-01-01;X;Parafuso;10;5.00;45.00\n").await, StatusCode::OK);

    for uri in ["/relatorio/interpretar", "/interpretar"] {
        let req = json_request("POST", uri, json!({ "pergunta": "Há riscos?" }), Some(&token));
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = extract_json(resp.into_body()).await;
        assert_eq!(body["resumo"]["totalNotas"], 1);
        assert_eq!(body["resumo"]["totalItens"], 1);
        assert_eq!(body["resumo"]["valorTotal"].as_f64(), Some(50.0));
        assert_eq!(body["resumo"]["impostoTotal"].as_f64(), Some(45.0));
        assert!(body["interpretacao"].as_str().unwrap().starts_with("Análise"));
    }
}

#[tokio::test]
async fn test_interpretation_propagates_upstream_failure() {
    let app = setup_app_with(FakeChat {
        status: Some(429),
        reply: "{\"error\":{\"code\":\"429\"}}".to_string(),
    });
    let token = login(&app).await;

    let req = json_request("POST", "/relatorio/interpretar", json!({ "Pergunta": "?" }), Some(&token));
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(extract_text(resp.into_body()).await, "{\"error\":{\"code\":\"429\"}}");
}

#[tokio::test]
async fn test_interpretation_rejects_empty_question() {
    let app = setup_app();
    let token = login(&app).await;
    let req = json_request("POST", "/relatorio/interpretar", json!({ "pergunta": "" }), Some(&token));
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
