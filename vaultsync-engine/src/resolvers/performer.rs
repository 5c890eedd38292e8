//! Account-to-performer resolution

use std::sync::Arc;
use tracing::{debug, info, instrument};
use vaultsync_catalog::{CatalogClient, CatalogError, Performer, PerformerCreateInput};
use vaultsync_store::{Account, AccountId, AccountRepository, MediaRepository};

use crate::error::Result;
use crate::resolvers::profile_url;

/// Resolves one catalog performer per account.
pub struct PerformerResolver {
    catalog: Arc<dyn CatalogClient>,
    accounts: Arc<dyn AccountRepository>,
    media: Arc<dyn MediaRepository>,
}

impl PerformerResolver {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        accounts: Arc<dyn AccountRepository>,
        media: Arc<dyn MediaRepository>,
    ) -> Self {
        Self {
            catalog,
            accounts,
            media,
        }
    }

    /// Resolve the performer for an account: linked id, then exact name,
    /// then create.
    #[instrument(skip(self), fields(account_id = %account.id))]
    pub async fn resolve(&self, account: &Account) -> Result<Performer> {
        if let Some(remote_id) = &account.performer_remote_id {
            if let Some(performer) = self.catalog.find_performer(remote_id).await? {
                debug!(performer_id = %performer.id, "Performer resolved via linked id");
                return Ok(performer);
            }
            debug!(remote_id, "Linked performer id no longer resolves, falling back to name");
        }

        let name = account.display_or_username();
        if let Some(performer) = self.find_exact(name).await? {
            self.link(account, &performer).await?;
            return Ok(performer);
        }

        let input = PerformerCreateInput {
            name: name.to_string(),
            aliases: if account.display_name.is_some() {
                vec![account.username.clone()]
            } else {
                vec![]
            },
            urls: vec![profile_url(&account.username)],
            image: self.avatar_path(account).await?,
        };

        let performer = match self.catalog.performer_create(&input).await {
            Ok(performer) => {
                info!(performer_id = %performer.id, name, "Created catalog performer");
                performer
            }
            // A concurrent writer won the create; the name query now sees
            // their performer.
            Err(CatalogError::AlreadyExists { .. }) => {
                match self.find_exact(name).await? {
                    Some(performer) => performer,
                    None => {
                        return Err(CatalogError::AlreadyExists {
                            name: name.to_string(),
                        }
                        .into())
                    }
                }
            }
            Err(e) => return Err(e.into()),
        };

        self.link(account, &performer).await?;
        Ok(performer)
    }

    /// Resolve a performer for a mentioned account id; unknown accounts are
    /// skipped rather than failed.
    pub async fn resolve_mention(&self, account_id: AccountId) -> Result<Option<Performer>> {
        match self.accounts.find_by_id(account_id).await? {
            Some(account) => Ok(Some(self.resolve(&account).await?)),
            None => {
                debug!(%account_id, "Mentioned account not in vault, skipping");
                Ok(None)
            }
        }
    }

    async fn find_exact(&self, name: &str) -> Result<Option<Performer>> {
        let performers = self.catalog.find_performers_by_name(name).await?;
        Ok(performers.into_iter().find(|p| p.name == name))
    }

    async fn link(&self, account: &Account, performer: &Performer) -> Result<()> {
        if account.performer_remote_id.as_deref() != Some(performer.id.as_str()) {
            self.accounts
                .set_performer_link(account.id, &performer.id)
                .await?;
        }
        Ok(())
    }

    async fn avatar_path(&self, account: &Account) -> Result<Option<String>> {
        let Some(media_id) = account.avatar_media_id else {
            return Ok(None);
        };
        Ok(self
            .media
            .find_by_id(media_id)
            .await?
            .and_then(|media| media.local_path))
    }
}
