mod common;

use common::{Authority, Pki, TOKEN_URL, Transport, assertion_claims, now, start_server};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

const JWT_BEARER: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

async fn request_token(
    client: &Client,
    base: &str,
    transport: &Transport,
    assertion: &str,
    scope: Option<&str>,
) -> Response {
    let mut form = vec![
        ("grant_type", "client_credentials"),
        ("client_assertion_type", JWT_BEARER),
        ("client_assertion", assertion),
    ];
    if let Some(scope) = scope {
        form.push(("scope", scope));
    }

    client
        .post(format!("{base}/oauth/token"))
        .header("x-forwarded-proto", "https")
        .header("x-forwarded-host", "nvi.test")
        .header("x-ssl-client-cert", transport.header_value())
        .header("x-ssl-client-verify", "SUCCESS")
        .form(&form)
        .send()
        .await
        .unwrap()
}

fn token_hash(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[tokio::test]
async fn token_issue_use_and_revoke() {
    let pki = Pki::new();
    let (base, shutdown_tx, handle) = start_server(&pki.config()).await;
    let client = Client::new();

    let transport = pki.oauth_ca.issue_transport("client.example.org");
    let signer = pki.assertion_ca.issue_signer("client.example.org");

    // GET /healthz
    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // POST /oauth/token
    let assertion = signer.assertion(&assertion_claims(&transport));
    let resp = request_token(&client, &base, &transport, &assertion, Some("referral:read")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["cache-control"], "no-store");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["scope"], "referral:read");
    assert_eq!(body["expires_in"], 900);
    let access_token = body["access_token"].as_str().unwrap().to_string();
    assert!(access_token.starts_with("nvi_"));

    // The same assertion cannot be presented twice
    let resp = request_token(&client, &base, &transport, &assertion, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_client");

    // Revocation requires a bearer token
    let resp = client
        .post(format!("{base}/oauth/revoke"))
        .form(&[("token_hash", token_hash(&access_token))])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key("www-authenticate"));

    // Unknown hash
    let resp = client
        .post(format!("{base}/oauth/revoke"))
        .bearer_auth(&access_token)
        .form(&[("token_hash", "00".repeat(32))])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Revoke the token itself
    let resp = client
        .post(format!("{base}/oauth/revoke"))
        .bearer_auth(&access_token)
        .form(&[("token_hash", token_hash(&access_token))])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // A revoked token no longer authenticates
    let resp = client
        .post(format!("{base}/oauth/revoke"))
        .bearer_auth(&access_token)
        .form(&[("token_hash", token_hash(&access_token))])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_token");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn token_request_rejections() {
    let pki = Pki::new();
    let (base, shutdown_tx, handle) = start_server(&pki.config()).await;
    let client = Client::new();

    let transport = pki.oauth_ca.issue_transport("client.example.org");
    let signer = pki.assertion_ca.issue_signer("client.example.org");

    // Audience must be the exact token endpoint URL
    let mut claims = assertion_claims(&transport);
    claims["aud"] = Value::from(format!("{TOKEN_URL}/"));
    let resp = request_token(&client, &base, &transport, &signer.assertion(&claims), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Assertion bound to a different transport certificate
    let other = pki.oauth_ca.issue_transport("other.example.org");
    let assertion = signer.assertion(&assertion_claims(&other));
    let resp = request_token(&client, &base, &transport, &assertion, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert!(
        body["error_description"]
            .as_str()
            .unwrap()
            .contains("cnf.x5t#S256")
    );

    // Signer issued by an untrusted authority
    let rogue = pki.direct_ca.issue_signer("client.example.org");
    let assertion = rogue.assertion(&assertion_claims(&transport));
    let resp = request_token(&client, &base, &transport, &assertion, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Scope outside the allowed set
    let assertion = signer.assertion(&assertion_claims(&transport));
    let resp = request_token(&client, &base, &transport, &assertion, Some("admin")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_scope");

    // Identity corroboration is not routed without nested token anchors
    let resp = client.get(format!("{base}/identity")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Unsupported grant type
    let resp = client
        .post(format!("{base}/oauth/token"))
        .form(&[("grant_type", "password")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "unsupported_grant_type");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn trust_path_classification() {
    let pki = Pki::new();
    let (base, shutdown_tx, handle) = start_server(&pki.config()).await;
    let client = Client::new();

    let classify = |transport: Option<Transport>| {
        let client = client.clone();
        let url = format!("{base}/trust-path");
        async move {
            let mut request = client.get(url);
            if let Some(transport) = transport {
                request = request
                    .header("x-ssl-client-cert", transport.header_value())
                    .header("x-ssl-client-verify", "SUCCESS");
            }
            let body: Value = request.send().await.unwrap().json().await.unwrap();
            body["trust_path"].clone()
        }
    };

    let direct = pki.direct_ca.issue_transport("org.example.org");
    assert_eq!(classify(Some(direct)).await, "direct_certificate");

    let oauth = pki.oauth_ca.issue_transport("client.example.org");
    assert_eq!(classify(Some(oauth)).await, "client_assertion");

    let unknown = pki.assertion_ca.issue_transport("unknown.example.org");
    assert_eq!(classify(Some(unknown)).await, Value::Null);

    assert_eq!(classify(None).await, Value::Null);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn revoke_is_limited_to_the_token_owner() {
    let pki = Pki::new();
    let (base, shutdown_tx, handle) = start_server(&pki.config()).await;
    let client = Client::new();
    let signer = pki.assertion_ca.issue_signer("client.example.org");

    let mut tokens = Vec::new();
    for owner in ["12341234", "56785678"] {
        let transport = pki.oauth_ca.issue_transport("client.example.org");
        let mut claims = assertion_claims(&transport);
        claims["sub"] = Value::from(owner);
        let resp =
            request_token(&client, &base, &transport, &signer.assertion(&claims), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        tokens.push(body["access_token"].as_str().unwrap().to_string());
    }
    let (first, second) = (&tokens[0], &tokens[1]);

    let revoke = |bearer: &str, target: &str| {
        client
            .post(format!("{base}/oauth/revoke"))
            .bearer_auth(bearer)
            .form(&[("token_hash", token_hash(target))])
            .send()
    };

    // Another owner's token looks unknown
    let resp = revoke(second, first).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // The refused revocation left it active for its owner
    let resp = revoke(first, first).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn nested_identity_corroboration() {
    const ASSERTION_HEADER: &str = "x-nvi-identity-assertion";

    let pki = Pki::new();
    let lrs_ca = Authority::new("LRS CA");
    let lrs = lrs_ca.issue_signer("lrs.example.org");
    let dezi = Authority::new("DEZI CA").issue_signer("dezi.example.org");

    std::fs::write(pki.path("lrs-ca.pem"), lrs_ca.pem()).unwrap();
    std::fs::create_dir(pki.path("signers")).unwrap();
    std::fs::write(pki.path("signers").join("dezi.pem"), dezi.pem()).unwrap();

    let mut cfg = pki.config();
    cfg.auth.nested_token.ca_bundle = Some(pki.path("lrs-ca.pem"));
    cfg.auth.nested_token.signing_certificates_dir = Some(pki.path("signers"));
    cfg.auth.nested_token.audience = "nvi".to_string();
    let (base, shutdown_tx, handle) = start_server(&cfg).await;
    let client = Client::new();

    // Bearer token owned by URA 12341234
    let transport = pki.oauth_ca.issue_transport("client.example.org");
    let mut claims = assertion_claims(&transport);
    claims["sub"] = Value::from("12341234");
    let signer = pki.assertion_ca.issue_signer("client.example.org");
    let resp = request_token(&client, &base, &transport, &signer.assertion(&claims), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let outer_for = |identity_number: &str| {
        let embedded = dezi.sign(
            &json!({
                "iss": "dezi",
                "sub": "900000001",
                "loa_authn": "http://eidas.europa.eu/LoA/high",
                "loa_dezi": "http://eidas.europa.eu/LoA/high",
                "relations": [
                    {"identity_number": identity_number, "entity_name": "X", "roles": ["01.010"]}
                ],
            }),
            // Free-form key id: the signer is found by scanning the registry
            |header| header.kid = Some("dezi-signing-key-2024".to_string()),
        );
        let now = now();
        lrs.sign(
            &json!({
                "iss": "lrs",
                "aud": "nvi",
                "iat": now,
                "nbf": now,
                "exp": now + 300,
                "case_id": "case-42",
                "embedded_token": embedded,
            }),
            |header| header.x5c = Some(vec![lrs.x5c(), lrs_ca.x5c()]),
        )
    };

    // Relation matches the bearer owner
    let resp = client
        .get(format!("{base}/identity"))
        .bearer_auth(&access_token)
        .header(ASSERTION_HEADER, outer_for("12341234"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["owner_identity"], "12341234");
    assert_eq!(body["case_id"], "case-42");
    assert_eq!(body["relation"]["entity_name"], "X");

    // No relation for the bearer owner
    let resp = client
        .get(format!("{base}/identity"))
        .bearer_auth(&access_token)
        .header(ASSERTION_HEADER, outer_for("99999999"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert!(
        body["error_description"]
            .as_str()
            .unwrap()
            .contains("99999999")
    );

    // Assertion header missing
    let resp = client
        .get(format!("{base}/identity"))
        .bearer_auth(&access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Bearer token missing
    let resp = client
        .get(format!("{base}/identity"))
        .header(ASSERTION_HEADER, outer_for("12341234"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
