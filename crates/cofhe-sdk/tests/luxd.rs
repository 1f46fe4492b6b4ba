//! Lux FHE client tests against a mock server.

use serde_json::json;
use wiremock::matchers::{body_bytes, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cofhe_sdk::luxd::{
    FheOp, FheUintType, ThresholdDecryptOptions, ZkProofType, DEFAULT_LUX_FHE_URL,
};
use cofhe_sdk::{ErrorCode, LuxFheClient, LuxFheConfig, U256};

fn client(server: &MockServer) -> LuxFheClient {
    LuxFheClient::threshold(server.uri())
}

#[tokio::test]
async fn health_reports_parties() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "threshold": true,
            "parties": 5,
            "tChainConnected": true,
        })))
        .mount(&server)
        .await;

    let health = client(&server).health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.parties, 5);
    assert_eq!(health.t_chain_connected, Some(true));
    assert_eq!(health.z_chain_connected, None);
}

#[tokio::test]
async fn health_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).health().await.unwrap_err();
    assert!(err.to_string().contains("Health check failed"));
}

#[tokio::test]
async fn public_key_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/publickey"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.public_key().await.unwrap(), vec![1, 2, 3]);
    assert_eq!(client.public_key().await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn public_key_failure_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/publickey"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    for _ in 0..2 {
        let err = client.public_key().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::FheKeyNotFound);
    }
}

#[tokio::test]
async fn encrypt_sends_value_and_width() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/encrypt"))
        .and(body_json(json!({ "value": 42, "bitWidth": 32 })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xc0, 0xde]))
        .expect(1)
        .mount(&server)
        .await;

    let ct = client(&server).encrypt(42, FheUintType::U32).await.unwrap();
    assert_eq!(ct.as_bytes(), &[0xc0, 0xde]);
    assert_eq!(ct.bit_width, FheUintType::U32);
}

#[tokio::test]
async fn encrypt_failure_carries_server_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/encrypt"))
        .respond_with(ResponseTemplate::new(400).set_body_string("value too large"))
        .mount(&server)
        .await;

    let err = client(&server).encrypt(300, FheUintType::U8).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InternalError);
    assert!(err.to_string().contains("Encryption failed: value too large"));
}

#[tokio::test]
async fn evaluate_sends_both_operands() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/evaluate"))
        .and(body_json(json!({
            "op": "add",
            "left": [1, 2],
            "right": [3],
            "bitWidth": 8,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9]))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let left = cofhe_sdk::luxd::EncryptedUint::from_bytes(vec![1, 2], FheUintType::U8);
    let right = cofhe_sdk::luxd::EncryptedUint::from_bytes(vec![3], FheUintType::U8);
    let sum = client.evaluate(FheOp::Add, &left, Some(&right)).await.unwrap();
    assert_eq!(sum.as_bytes(), &[9]);
    assert_eq!(sum.bit_width, FheUintType::U8);
}

#[tokio::test]
async fn threshold_decrypt_goes_through_t_chain() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threshold/decrypt"))
        .and(body_json(json!({
            "ciphertext": [7, 7],
            "threshold": 3,
            "callbackUrl": "http://callback",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "12345" })))
        .expect(1)
        .mount(&server)
        .await;

    let options = ThresholdDecryptOptions {
        threshold: Some(3),
        callback_url: Some("http://callback".into()),
    };
    let value = client(&server).threshold_decrypt(&[7, 7], &options).await.unwrap();
    assert_eq!(value, U256::from(12345u32));
}

#[tokio::test]
async fn decrypt_in_threshold_mode_omits_options() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threshold/decrypt"))
        .and(body_json(json!({ "ciphertext": [5] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": 8 })))
        .expect(1)
        .mount(&server)
        .await;

    let value = client(&server).decrypt(&[5]).await.unwrap();
    assert_eq!(value, U256::from(8u8));
}

#[tokio::test]
async fn decrypt_without_threshold_posts_raw_ciphertext() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/decrypt"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(vec![0xab, 0xcd]))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "0xff" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LuxFheClient::new(LuxFheConfig {
        threshold_mode: false,
        ..LuxFheConfig::new(server.uri())
    });
    assert_eq!(client.decrypt(&[0xab, 0xcd]).await.unwrap(), U256::from(255u8));
}

#[tokio::test]
async fn threshold_decrypt_failure_maps_to_decrypt_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threshold/decrypt"))
        .respond_with(ResponseTemplate::new(502).set_body_string("quorum not reached"))
        .mount(&server)
        .await;

    let err = client(&server).decrypt(&[1]).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::DecryptFailed);
    assert!(err.to_string().contains("quorum not reached"));
}

#[tokio::test]
async fn threshold_parties_listed_from_t_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/threshold/parties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "publicKey": [1, 1] },
            { "id": 2, "publicKey": [2, 2] },
        ])))
        .mount(&server)
        .await;

    let parties = client(&server).threshold_parties().await.unwrap();
    assert_eq!(parties.len(), 2);
    assert_eq!(parties[1].id, 2);
    assert_eq!(parties[1].public_key, vec![2, 2]);
}

#[tokio::test]
async fn zk_prove_defaults_to_groth16() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/zk/prove"))
        .and(body_json(json!({ "ciphertext": [4], "proofType": "groth16" })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xaa]))
        .expect(1)
        .mount(&server)
        .await;

    let proof = client(&server)
        .zk_prove(&[4], None, ZkProofType::default())
        .await
        .unwrap();
    assert_eq!(proof, vec![0xaa]);
}

#[tokio::test]
async fn zk_prove_failure_maps_to_zk_verify_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/zk/prove"))
        .respond_with(ResponseTemplate::new(500).set_body_string("prover offline"))
        .mount(&server)
        .await;

    let err = client(&server)
        .zk_prove(&[4], Some(&[1]), ZkProofType::Plonk)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ZkVerifyFailed);
    assert!(err.to_string().contains("prover offline"));
}

#[tokio::test]
async fn zk_verify_requires_explicit_true() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/zk/verify"))
        .and(body_json(json!({ "proof": [1], "publicInputs": [2] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "verified": true })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/zk/verify"))
        .and(body_json(json!({ "proof": [9] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(client.zk_verify(&[1], Some(&[2])).await.unwrap());
    assert!(!client.zk_verify(&[9], None).await.unwrap());
}

#[tokio::test]
async fn zk_verify_server_error_is_false() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/zk/verify"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(!client(&server).zk_verify(&[1], None).await.unwrap());
}

#[tokio::test]
async fn explicit_chain_urls_are_used() {
    let tn = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/decrypt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": 1 })))
        .expect(1)
        .mount(&tn)
        .await;

    let client = LuxFheClient::new(LuxFheConfig {
        t_chain_url: Some(tn.uri()),
        ..LuxFheConfig::new(DEFAULT_LUX_FHE_URL)
    });
    assert_eq!(client.decrypt(&[1]).await.unwrap(), U256::from(1u8));
}
