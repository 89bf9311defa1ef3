use std::{fs::File, io::BufReader};

use base64::Engine;
use color_eyre::Result;
use eyre::{eyre, WrapErr};
use hyper::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    http::HeaderValue,
    Body, Method, Request, StatusCode, Uri,
};
use serde::Deserialize;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::{error::TransportError, settings::Settings};

pub type HyperHttpsClient =
    hyper::Client<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>;

/// HTTP(S) client plus the pieces every desk server request needs.
#[derive(Clone)]
pub struct DeskServerHttp {
    client: HyperHttpsClient,
    base_path: String,
    authorization: HeaderValue,
}

pub fn mk_hyper_https_client(settings: &Settings) -> Result<HyperHttpsClient> {
    let builder = hyper_rustls::HttpsConnectorBuilder::new();

    // Allow trusting a private CA for servers running with their own certificate
    let builder = match &settings.desk_server.ca_cert {
        Some(path) => {
            let file = File::open(path).wrap_err_with(|| format!("Failed to open {path}"))?;
            let certs = rustls_pemfile::certs(&mut BufReader::new(file))?;

            let mut roots = RootCertStore::empty();
            let (added, _ignored) = roots.add_parsable_certificates(&certs[..]);
            if added == 0 {
                return Err(eyre!("No usable certificates found in {path}"));
            }

            let tls_config = ClientConfig::builder()
                .with_safe_defaults()
                .with_root_certificates(roots)
                .with_no_client_auth();

            builder.with_tls_config(tls_config)
        }
        None => builder.with_native_roots(),
    };

    let https = builder.https_or_http().enable_http1().build();

    Ok(hyper::Client::builder().build(https))
}

pub fn basic_auth_header(username: &str, password: &str) -> Result<HeaderValue> {
    let credentials =
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {credentials}"))?;
    value.set_sensitive(true);

    Ok(value)
}

impl DeskServerHttp {
    pub fn new(settings: &Settings, client: HyperHttpsClient) -> Result<Self> {
        let authorization =
            basic_auth_header(&settings.desk_server.username, &settings.desk_server.password)?;

        Ok(DeskServerHttp {
            client,
            base_path: settings.desk_server.base_path.trim_end_matches('/').to_string(),
            authorization,
        })
    }

    pub fn uri(&self, path: &str) -> Result<Uri, TransportError> {
        Ok(format!("{}{}", self.base_path, path).parse()?)
    }

    pub async fn mk_get_request<T: for<'a> Deserialize<'a>>(
        &self,
        path: &str,
    ) -> Result<T, TransportError> {
        let uri = self.uri(path)?;
        let request = Request::builder()
            .method(Method::GET)
            .header(AUTHORIZATION, self.authorization.clone())
            .uri(&uri)
            .body(Body::empty())?;

        let result = self.client.request(request).await?;
        let status = result.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status,
                uri: uri.to_string(),
            });
        }

        let body_bytes = hyper::body::to_bytes(result.into_body()).await?;
        let de = &mut serde_json::Deserializer::from_slice(&body_bytes);
        let response: T = serde_path_to_error::deserialize(de)?;

        Ok(response)
    }

    /// Sends `body` as plain text and requires exactly `expected` back.
    pub async fn mk_post_text_request(
        &self,
        path: &str,
        body: String,
        expected: StatusCode,
    ) -> Result<(), TransportError> {
        let uri = self.uri(path)?;
        let request = Request::builder()
            .method(Method::POST)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(CONTENT_TYPE, "text/plain")
            .uri(&uri)
            .body(body.into())?;

        let result = self.client.request(request).await?;
        let status = result.status();

        // Drain the body so the connection can be reused
        hyper::body::to_bytes(result.into_body()).await?;

        if status != expected {
            return Err(TransportError::Status {
                status,
                uri: uri.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_is_base64_of_credentials() {
        let header = basic_auth_header("Aladdin", "open sesame").unwrap();

        assert_eq!(header.to_str().unwrap(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
        assert!(header.is_sensitive());
    }
}
