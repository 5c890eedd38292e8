//! Account-to-studio resolution under the shared network studio

use std::sync::Arc;
use tracing::{debug, info, instrument};
use vaultsync_catalog::{CatalogClient, CatalogError, Studio, StudioCreateInput, StudioUpdateInput};
use vaultsync_store::{Account, AccountRepository};

use crate::error::{Result, SyncError};
use crate::resolvers::profile_url;

/// Name of the top-level studio every creator studio hangs under. It is
/// provisioned by the operator, never created here; its absence fails the
/// whole run.
pub const NETWORK_STUDIO_QUERY: &str = "Fansly (network)";

/// Resolves one catalog studio per account, parented to the network studio.
pub struct StudioResolver {
    catalog: Arc<dyn CatalogClient>,
    accounts: Arc<dyn AccountRepository>,
}

impl StudioResolver {
    pub fn new(catalog: Arc<dyn CatalogClient>, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { catalog, accounts }
    }

    /// Resolve the creator studio for an account: linked id, then exact
    /// name, then create under the network studio.
    #[instrument(skip(self), fields(account_id = %account.id))]
    pub async fn resolve(&self, account: &Account) -> Result<Studio> {
        if let Some(remote_id) = &account.studio_remote_id {
            if let Some(studio) = self.catalog.find_studio(remote_id).await? {
                debug!(studio_id = %studio.id, "Studio resolved via linked id");
                return Ok(studio);
            }
            debug!(remote_id, "Linked studio id no longer resolves, falling back to name");
        }

        let network = self.network_studio().await?;

        let name = creator_studio_name(&account.username);
        if let Some(studio) = self.find_exact(&name).await? {
            let studio = self.backfill_parent(studio, &network).await?;
            self.link(account, &studio).await?;
            return Ok(studio);
        }

        let input = StudioCreateInput {
            name: name.clone(),
            url: Some(profile_url(&account.username)),
            parent_id: Some(network.id.clone()),
        };

        let studio = match self.catalog.studio_create(&input).await {
            Ok(studio) => {
                info!(studio_id = %studio.id, name, "Created creator studio");
                studio
            }
            // A concurrent writer won the create; the name query now sees
            // their studio.
            Err(CatalogError::AlreadyExists { .. }) => match self.find_exact(&name).await? {
                Some(studio) => studio,
                None => return Err(CatalogError::AlreadyExists { name }.into()),
            },
            Err(e) => return Err(e.into()),
        };

        self.link(account, &studio).await?;
        Ok(studio)
    }

    /// The network studio is a precondition for every sync run.
    pub async fn network_studio(&self) -> Result<Studio> {
        match self.find_exact(NETWORK_STUDIO_QUERY).await? {
            Some(studio) => Ok(studio),
            None => Err(SyncError::MissingNetworkStudio {
                query: NETWORK_STUDIO_QUERY.to_string(),
            }),
        }
    }

    async fn find_exact(&self, name: &str) -> Result<Option<Studio>> {
        let studios = self.catalog.find_studios(name).await?;
        Ok(studios.into_iter().find(|s| s.name == name))
    }

    /// Studios created by hand or by older versions may float without a
    /// parent; adopt them under the network studio.
    async fn backfill_parent(&self, studio: Studio, network: &Studio) -> Result<Studio> {
        if studio.parent_studio.is_some() {
            return Ok(studio);
        }
        debug!(studio_id = %studio.id, "Backfilling missing parent studio");
        let updated = self
            .catalog
            .studio_update(&StudioUpdateInput {
                id: studio.id.clone(),
                parent_id: Some(network.id.clone()),
            })
            .await?;
        Ok(updated)
    }

    async fn link(&self, account: &Account, studio: &Studio) -> Result<()> {
        if account.studio_remote_id.as_deref() != Some(studio.id.as_str()) {
            self.accounts.set_studio_link(account.id, &studio.id).await?;
        }
        Ok(())
    }
}

/// Per-creator studio name.
pub(crate) fn creator_studio_name(username: &str) -> String {
    format!("{} (Fansly)", username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCatalog;
    use vaultsync_store::{create_test_pool, AccountId, SqliteAccountRepository};

    async fn setup(catalog: Arc<FakeCatalog>) -> (StudioResolver, Arc<dyn AccountRepository>) {
        let pool = create_test_pool().await.unwrap();
        sqlx::query("INSERT INTO accounts (id, username) VALUES (1, 'alice')")
            .execute(&pool)
            .await
            .unwrap();
        let accounts: Arc<dyn AccountRepository> = Arc::new(SqliteAccountRepository::new(pool));
        let resolver = StudioResolver::new(catalog, Arc::clone(&accounts));
        (resolver, accounts)
    }

    fn account() -> Account {
        Account {
            id: AccountId(1),
            username: "alice".to_string(),
            display_name: None,
            avatar_media_id: None,
            performer_remote_id: None,
            studio_remote_id: None,
        }
    }

    #[tokio::test]
    async fn test_missing_network_studio_is_fatal() {
        let catalog = Arc::new(FakeCatalog::new());
        let (resolver, _) = setup(catalog).await;

        let err = resolver.resolve(&account()).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingNetworkStudio { .. }));
    }

    #[tokio::test]
    async fn test_create_parents_under_network_studio() {
        let catalog = Arc::new(FakeCatalog::new());
        let network = catalog.seed_studio("Fansly (network)", None);
        let (resolver, accounts) = setup(Arc::clone(&catalog)).await;

        let studio = resolver.resolve(&account()).await.unwrap();
        assert_eq!(studio.name, "alice (Fansly)");
        assert_eq!(
            studio.parent_studio.as_ref().map(|p| p.id.as_str()),
            Some(network.id.as_str())
        );
        assert_eq!(
            catalog.calls(),
            vec![
                "findStudios:Fansly (network)",
                "findStudios:alice (Fansly)",
                "studioCreate",
            ]
        );

        let stored = accounts.find_by_id(AccountId(1)).await.unwrap().unwrap();
        assert_eq!(stored.studio_remote_id, Some(studio.id));
    }

    #[tokio::test]
    async fn test_linked_id_skips_name_lookups() {
        let catalog = Arc::new(FakeCatalog::new());
        let network = catalog.seed_studio("Fansly (network)", None);
        let existing = catalog.seed_studio("alice (Fansly)", Some(&network.id));
        let (resolver, _) = setup(Arc::clone(&catalog)).await;

        let mut account = account();
        account.studio_remote_id = Some(existing.id.clone());

        let studio = resolver.resolve(&account).await.unwrap();
        assert_eq!(studio.id, existing.id);
        assert_eq!(catalog.calls(), vec!["findStudio"]);
    }

    #[tokio::test]
    async fn test_stale_linked_id_falls_back_to_name() {
        let catalog = Arc::new(FakeCatalog::new());
        let network = catalog.seed_studio("Fansly (network)", None);
        let existing = catalog.seed_studio("alice (Fansly)", Some(&network.id));
        let (resolver, _) = setup(Arc::clone(&catalog)).await;

        let mut account = account();
        account.studio_remote_id = Some("gone".to_string());

        let studio = resolver.resolve(&account).await.unwrap();
        assert_eq!(studio.id, existing.id);
        assert_eq!(
            catalog.calls(),
            vec![
                "findStudio",
                "findStudios:Fansly (network)",
                "findStudios:alice (Fansly)",
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_studio_gets_parent_backfilled() {
        let catalog = Arc::new(FakeCatalog::new());
        let network = catalog.seed_studio("Fansly (network)", None);
        let orphan = catalog.seed_studio("alice (Fansly)", None);
        let (resolver, _) = setup(Arc::clone(&catalog)).await;

        let studio = resolver.resolve(&account()).await.unwrap();
        assert_eq!(studio.id, orphan.id);
        assert_eq!(
            studio.parent_studio.as_ref().map(|p| p.id.as_str()),
            Some(network.id.as_str())
        );
        assert_eq!(catalog.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_parented_studio_is_left_alone() {
        let catalog = Arc::new(FakeCatalog::new());
        let network = catalog.seed_studio("Fansly (network)", None);
        catalog.seed_studio("alice (Fansly)", Some(&network.id));
        let (resolver, _) = setup(Arc::clone(&catalog)).await;

        resolver.resolve(&account()).await.unwrap();
        assert_eq!(catalog.mutation_count(), 0);
    }
}
