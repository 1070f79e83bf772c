use thiserror::Error;

use super::RadioParam;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rpc endpoint returned http {0}")]
    Status(reqwest::StatusCode),
}

/// XML-RPC client for the signal-processing endpoint.
///
/// The daemon is purely a caller of `set_<name>` methods; responses are only
/// checked for transport-level success.
pub struct RpcClient {
    endpoint: String,
    http: reqwest::Client,
}

impl RpcClient {
    pub fn new(port: u16) -> Self {
        Self {
            endpoint: format!("http://127.0.0.1:{}/", port),
            http: reqwest::Client::new(),
        }
    }

    pub async fn set(&self, param: &RadioParam) -> Result<(), RpcError> {
        self.call(param.method(), Some(&param_value_xml(param))).await?;
        Ok(())
    }

    /// Asks the endpoint for its method list and reports which of the known
    /// setters are missing. Transport failure is the caller's to log; a
    /// missing introspection method just means nothing can be checked.
    pub async fn missing_methods(&self) -> Result<Vec<&'static str>, RpcError> {
        let body = self.call("system.listMethods", None).await?;
        Ok(RadioParam::METHODS
            .iter()
            .filter(|m| !body.contains(&format!("<string>{}</string>", m)))
            .copied()
            .collect())
    }

    async fn call(&self, method: &str, value_xml: Option<&str>) -> Result<String, RpcError> {
        let params = match value_xml {
            Some(v) => format!("<params><param><value>{}</value></param></params>", v),
            None => "<params></params>".to_string(),
        };
        let body = format!(
            "<?xml version=\"1.0\"?><methodCall><methodName>{}</methodName>{}</methodCall>",
            method, params
        );
        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "text/xml")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status(status));
        }
        Ok(response.text().await?)
    }
}

fn param_value_xml(param: &RadioParam) -> String {
    match param {
        RadioParam::Freq(v)
        | RadioParam::SampRate(v)
        | RadioParam::MotorAz(v)
        | RadioParam::MotorEl(v)
        | RadioParam::Tsys(v)
        | RadioParam::Tcal(v)
        | RadioParam::CalPwr(v) => double_xml(*v),
        RadioParam::Soutrack(s) => format!("<string>{}</string>", escape_xml(s)),
        RadioParam::IsRunning(b) => format!("<boolean>{}</boolean>", u8::from(*b)),
        RadioParam::BeamSwitch(n) => format!("<int>{}</int>", n),
        RadioParam::CalValues(values) => {
            let mut xml = String::from("<array><data>");
            for v in values {
                xml.push_str("<value>");
                xml.push_str(&double_xml(*v));
                xml.push_str("</value>");
            }
            xml.push_str("</data></array>");
            xml
        }
    }
}

fn double_xml(v: f64) -> String {
    format!("<double>{}</double>", v)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
