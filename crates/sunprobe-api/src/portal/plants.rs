// Plant and measurement endpoints
//
// Structured JSON endpoints used for historical series. Unlike the live
// probe these have a fixed shape, so they are called directly.

use serde_json::Value;
use tracing::debug;

use super::client::PortalClient;
use super::models::{MeasurementsEnvelope, first_plant_id};
use crate::error::Error;
use crate::session::Credential;

const PLANTS_PATH: &str = "/api/v1/plants";

impl PortalClient {
    /// List plants visible to the session (raw JSON).
    pub async fn list_plants(&self, credential: &Credential) -> Result<Value, Error> {
        self.get_json(PLANTS_PATH, credential, &[]).await
    }

    /// Identifier of the first plant on the account.
    pub async fn first_plant_id(&self, credential: &Credential) -> Result<String, Error> {
        let listing = self.list_plants(credential).await?;
        let id = first_plant_id(&listing).ok_or_else(|| Error::Deserialization {
            message: "plant listing contains no plant identifier".into(),
            body: listing.to_string(),
        })?;
        debug!(plant_id = %id, "resolved plant");
        Ok(id)
    }

    /// Measurement series for one plant over `[from, to]` at a given resolution.
    ///
    /// `from` and `to` are passed through verbatim (RFC 3339 timestamps).
    pub async fn measurements(
        &self,
        credential: &Credential,
        plant_id: &str,
        from: &str,
        to: &str,
        resolution: &str,
    ) -> Result<MeasurementsEnvelope, Error> {
        let path = format!("{PLANTS_PATH}/{plant_id}/measurements");
        self.get_json(
            &path,
            credential,
            &[
                ("from", from.to_owned()),
                ("to", to.to_owned()),
                ("resolution", resolution.to_owned()),
            ],
        )
        .await
    }
}
