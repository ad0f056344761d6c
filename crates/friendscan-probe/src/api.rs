use async_trait::async_trait;
use friendscan_client::{ClientError, GroupSnapshot, WebApi};
use friendscan_core::Contact;

/// The three group-chat calls a probe run makes, once per batch.
#[async_trait]
pub trait ProbeApi: Send + Sync {
    async fn create_group(&self, ids: &[String]) -> Result<GroupSnapshot, ClientError>;

    /// Returns the members as echoed back, with their status.
    async fn add_members(&self, group_id: &str, ids: &[String])
        -> Result<Vec<Contact>, ClientError>;

    async fn remove_members(&self, group_id: &str, ids: &[String]) -> Result<(), ClientError>;
}

#[async_trait]
impl ProbeApi for WebApi {
    async fn create_group(&self, ids: &[String]) -> Result<GroupSnapshot, ClientError> {
        WebApi::create_group(self, ids).await
    }

    async fn add_members(
        &self,
        group_id: &str,
        ids: &[String],
    ) -> Result<Vec<Contact>, ClientError> {
        WebApi::add_members(self, group_id, ids).await
    }

    async fn remove_members(&self, group_id: &str, ids: &[String]) -> Result<(), ClientError> {
        WebApi::remove_members(self, group_id, ids).await
    }
}
