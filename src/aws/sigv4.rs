//! AWS Signature Version 4 请求签名

use crate::aws::credentials::Credentials;
use crate::error::FetchError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// 除非保留字符外全部编码
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// 待签名的请求
#[derive(Debug)]
pub struct SigningRequest<'a> {
    /// HTTP方法
    pub method: &'a str,
    /// 请求URL，路径必须已经编码
    pub url: &'a Url,
    /// 需要参与签名的额外请求头
    pub headers: &'a [(String, String)],
    /// 请求体
    pub payload: &'a [u8],
    /// 是否附加 `x-amz-content-sha256`（S3 要求）
    pub include_content_sha256: bool,
}

/// 按 AWS 规则编码单个值
pub fn uri_encode(value: &str) -> String {
    utf8_percent_encode(value, URI_ENCODE_SET).to_string()
}

/// 逐段编码路径，保留 `/`
pub fn encode_path(path: &str) -> String {
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

/// 十六进制 SHA-256
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, FetchError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| FetchError::Credentials(format!("签名密钥无效: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// 派生签名密钥
pub fn signing_key(
    secret_access_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, FetchError> {
    let k_date = hmac_sha256(format!("AWS4{secret_access_key}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// 计算签名并返回需要附加到请求上的头
///
/// # 参数
/// * `request` - 待签名请求
/// * `credentials` - 访问凭证
/// * `region` - 区域
/// * `service` - 服务签名名称
/// * `now` - 签名时间
///
/// # 返回
/// * `Result<Vec<(String, String)>, FetchError>` - `x-amz-date`、可选的
///   `x-amz-content-sha256`/`x-amz-security-token` 以及 `authorization`
pub fn sign(
    request: &SigningRequest<'_>,
    credentials: &Credentials,
    region: &str,
    service: &str,
    now: DateTime<Utc>,
) -> Result<Vec<(String, String)>, FetchError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let payload_hash = sha256_hex(request.payload);

    let mut added: Vec<(String, String)> = vec![("x-amz-date".to_string(), amz_date.clone())];
    if request.include_content_sha256 {
        added.push(("x-amz-content-sha256".to_string(), payload_hash.clone()));
    }
    if let Some(token) = &credentials.session_token {
        added.push(("x-amz-security-token".to_string(), token.clone()));
    }

    let mut canonical_headers: Vec<(String, String)> = request
        .headers
        .iter()
        .chain(added.iter())
        .map(|(k, v)| (k.to_lowercase(), v.trim().to_string()))
        .collect();
    canonical_headers.push(("host".to_string(), host_header(request.url)));
    canonical_headers.sort();

    let signed_headers = canonical_headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let header_block: String = canonical_headers
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        request.url.path(),
        canonical_query(request.url),
        header_block,
        signed_headers,
        payload_hash
    );

    let scope = format!("{date}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(&credentials.secret_access_key, &date, region, service)?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    added.push((
        "authorization".to_string(),
        format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
    ));
    Ok(added)
}
