use super::{NodeAddress, PullError, ReportTransport, ResourceReport};
use std::time::Duration;

/// Requests resource reports from the nodes' http endpoint.
///
/// `GET http://{ip}:{port}/v1/resource-report?full={full_report}`, with the node's routing id
/// in the `x-node-id` header. A node with no changes since its last report answers with
/// `304 Not Modified`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Create a new `Self` with the given connect and request timeouts.
    pub fn new(
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            request_timeout,
        })
    }

    /// Get the resource report url of the node.
    fn report_url(address: &NodeAddress, full_report: bool) -> Result<url::Url, PullError> {
        let endpoint = format!("http://{address}{}", utils::RESOURCE_REPORT_PATH);
        let mut url = url::Url::parse(&endpoint).map_err(|source| PullError::InvalidAddress {
            address: address.to_string(),
            source,
        })?;
        url.query_pairs_mut()
            .append_pair("full", if full_report { "true" } else { "false" });
        Ok(url)
    }
}

#[async_trait::async_trait]
impl ReportTransport for HttpTransport {
    async fn request_report(
        &self,
        address: &NodeAddress,
        full_report: bool,
    ) -> Result<ResourceReport, PullError> {
        let url = Self::report_url(address, full_report)?;

        let response = self
            .client
            .get(url)
            .header(utils::NODE_ID_HEADER, address.node_id.as_str())
            .send()
            .await
            .map_err(|source| self.request_error(address, source))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_MODIFIED {
            return Err(PullError::Unchanged);
        }
        if !status.is_success() {
            return Err(PullError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| self.request_error(address, source))?;
        serde_json::from_slice::<ResourceReport>(&body).map_err(|error| PullError::BadReply {
            reason: error.to_string(),
        })
    }
}

impl HttpTransport {
    fn request_error(&self, address: &NodeAddress, source: reqwest::Error) -> PullError {
        if source.is_timeout() {
            PullError::Timeout {
                timeout: self.request_timeout,
            }
        } else {
            PullError::Unreachable {
                endpoint: address.to_string(),
                source,
            }
        }
    }
}
