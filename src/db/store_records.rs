use anyhow::{Context, Result};

use crate::models::*;
use super::{ClientIdentifierRepo, LicenceRepo, StatusKeyRepo, StatusRepo, Store, WorkNoteRepo};

impl Store {
    // ========== Work Note Operations ==========

    pub async fn list_work_notes(&self, computer_id: i64) -> Result<Vec<WorkNote>> {
        WorkNoteRepo::list_for_computer(&self.pool, computer_id).await
    }

    pub async fn list_unattached_work_notes(&self) -> Result<Vec<WorkNote>> {
        WorkNoteRepo::list_unattached(&self.pool).await
    }

    pub async fn create_work_note(&self, req: &CreateWorkNoteRequest) -> Result<WorkNote> {
        let mut tx = self.begin_write().await?;
        let note = WorkNoteRepo::create(&mut tx, req).await?;
        tx.commit().await.context("Failed to commit work note")?;
        Ok(note)
    }

    pub async fn set_work_note_active(&self, id: i64, active: bool) -> Result<WorkNote> {
        let _gate = self.write_gate().await;
        WorkNoteRepo::set_active(&self.pool, id, active).await
    }

    pub async fn delete_work_note(&self, id: i64) -> Result<()> {
        let _gate = self.write_gate().await;
        WorkNoteRepo::delete(&self.pool, id).await
    }

    // ========== Licence Operations ==========

    pub async fn list_licences(&self, computer_id: i64) -> Result<Vec<Licence>> {
        LicenceRepo::list_for_computer(&self.pool, computer_id).await
    }

    pub async fn list_unattached_licences(&self) -> Result<Vec<Licence>> {
        LicenceRepo::list_unattached(&self.pool).await
    }

    pub async fn create_licence(&self, req: &CreateLicenceRequest) -> Result<Licence> {
        let mut tx = self.begin_write().await?;
        let licence = LicenceRepo::create(&mut tx, req).await?;
        tx.commit().await.context("Failed to commit licence")?;
        Ok(licence)
    }

    pub async fn reassign_licence(&self, id: i64, computer_id: Option<i64>) -> Result<Licence> {
        let mut tx = self.begin_write().await?;
        let licence = LicenceRepo::reassign(&mut tx, id, computer_id).await?;
        tx.commit().await.context("Failed to commit licence reassignment")?;
        Ok(licence)
    }

    pub async fn delete_licence(&self, id: i64) -> Result<()> {
        let _gate = self.write_gate().await;
        LicenceRepo::delete(&self.pool, id).await
    }

    // ========== Client Identifier Operations ==========

    pub async fn list_client_identifiers(&self, computer_id: i64) -> Result<Vec<ClientIdentifier>> {
        ClientIdentifierRepo::list_for_computer(&self.pool, computer_id).await
    }

    pub async fn set_client_identifier(&self, computer_id: i64, key: &str, value: &str) -> Result<ClientIdentifier> {
        let mut tx = self.begin_write().await?;
        let ident = ClientIdentifierRepo::set(&mut tx, computer_id, key, value).await?;
        tx.commit().await.context("Failed to commit client identifier")?;
        Ok(ident)
    }

    pub async fn delete_client_identifier(&self, computer_id: i64, key: &str) -> Result<()> {
        let _gate = self.write_gate().await;
        ClientIdentifierRepo::delete(&self.pool, computer_id, key).await
    }

    // ========== Status Operations ==========

    pub async fn list_status_keys(&self) -> Result<Vec<StatusKey>> {
        StatusKeyRepo::list(&self.pool).await
    }

    pub async fn get_status_key(&self, slug: &str) -> Result<Option<StatusKey>> {
        StatusKeyRepo::get_by_slug(&self.pool, slug).await
    }

    pub async fn create_status_key(&self, req: &CreateStatusKeyRequest) -> Result<StatusKey> {
        let _gate = self.write_gate().await;
        StatusKeyRepo::create(&self.pool, req).await
    }

    /// Inactive keys keep their history but accept no new values
    pub async fn set_status_key_active(&self, slug: &str, active: bool) -> Result<StatusKey> {
        let _gate = self.write_gate().await;
        StatusKeyRepo::set_active(&self.pool, slug, active).await
    }

    pub async fn record_status(&self, computer_id: i64, key: &str, value: &str) -> Result<Status> {
        let mut tx = self.begin_write().await?;
        let status = StatusRepo::record(&mut tx, computer_id, key, value).await?;
        tx.commit().await.context("Failed to commit status")?;
        tracing::debug!("Computer {} reported {}={}", computer_id, status.key, status.value);
        Ok(status)
    }

    pub async fn list_statuses(&self, computer_id: i64) -> Result<Vec<Status>> {
        StatusRepo::list_for_computer(&self.pool, computer_id).await
    }

    /// Newest status per key; an empty `keys` means every key
    pub async fn latest_statuses(&self, computer_id: i64, keys: &[String]) -> Result<Vec<Status>> {
        StatusRepo::latest_by_key(&self.pool, computer_id, keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_store;
    use crate::db::ErrorKind;
    use tokio_test::{assert_err, assert_ok};

    async fn add_computer(store: &Store, name: &str) -> Computer {
        store
            .create_computer(&CreateComputerRequest::new(name, "None"))
            .await
            .expect("create computer")
    }

    async fn add_status_key(store: &Store, slug: &str, name: &str, data_type: StatusDataType) -> StatusKey {
        store
            .create_status_key(&CreateStatusKeyRequest {
                slug: slug.to_string(),
                verbose_name: name.to_string(),
                volatile: false,
                data_type,
                active: true,
            })
            .await
            .expect("create status key")
    }

    #[tokio::test]
    async fn test_work_notes() {
        let store = test_store().await;
        let computer = add_computer(&store, "lab").await;

        let first = assert_ok!(
            store
                .create_work_note(&CreateWorkNoteRequest {
                    computer_id: Some(computer.id),
                    value: "Replaced fan".to_string(),
                    author: Some(" sam ".to_string()),
                })
                .await
        );
        assert_eq!(first.author.as_deref(), Some("sam"));
        assert!(first.active);
        let second = assert_ok!(
            store
                .create_work_note(&CreateWorkNoteRequest {
                    computer_id: Some(computer.id),
                    value: "Reimaged".to_string(),
                    author: None,
                })
                .await
        );
        assert!(second.author.is_none());
        assert_ok!(
            store
                .create_work_note(&CreateWorkNoteRequest {
                    computer_id: None,
                    value: "Order toner".to_string(),
                    author: None,
                })
                .await
        );

        let ids: Vec<i64> = store.list_work_notes(computer.id).await.unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(store.list_unattached_work_notes().await.unwrap().len(), 1);

        let hidden = assert_ok!(store.set_work_note_active(first.id, false).await);
        assert!(!hidden.active);
        assert_ok!(store.delete_work_note(second.id).await);
        let err = assert_err!(store.delete_work_note(second.id).await);
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);

        let blank = CreateWorkNoteRequest {
            computer_id: Some(computer.id),
            value: "  ".to_string(),
            author: None,
        };
        let err = assert_err!(store.create_work_note(&blank).await);
        assert_eq!(ErrorKind::of(&err), ErrorKind::Validation);
        let orphan = CreateWorkNoteRequest {
            computer_id: Some(9999),
            value: "lost".to_string(),
            author: None,
        };
        let err = assert_err!(store.create_work_note(&orphan).await);
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_licences() {
        let store = test_store().await;
        let lab = add_computer(&store, "lab").await;
        let desk = add_computer(&store, "desk").await;

        let licence = assert_ok!(
            store
                .create_licence(&CreateLicenceRequest {
                    computer_id: Some(lab.id),
                    value: "OFFICE-1234".to_string(),
                })
                .await
        );
        assert_eq!(store.list_licences(lab.id).await.unwrap().len(), 1);

        let moved = assert_ok!(store.reassign_licence(licence.id, Some(desk.id)).await);
        assert_eq!(moved.computer_id, Some(desk.id));
        assert!(store.list_licences(lab.id).await.unwrap().is_empty());

        let detached = assert_ok!(store.reassign_licence(licence.id, None).await);
        assert!(detached.computer_id.is_none());
        assert_eq!(store.list_unattached_licences().await.unwrap().len(), 1);

        let err = assert_err!(store.reassign_licence(licence.id, Some(9999)).await);
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);
        let err = assert_err!(store.reassign_licence(9999, None).await);
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);

        assert_ok!(store.delete_licence(licence.id).await);
        assert!(store.list_unattached_licences().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_client_identifiers() {
        let store = test_store().await;
        let computer = add_computer(&store, "lab").await;

        let ident = assert_ok!(store.set_client_identifier(computer.id, "teamviewer", "123 456 789").await);
        assert_eq!(ident.to_string(), "teamviewer:123 456 789");

        // setting the same key again replaces the value
        let replaced = assert_ok!(store.set_client_identifier(computer.id, "teamviewer", "987").await);
        assert_eq!(replaced.id, ident.id);
        assert_eq!(replaced.value, "987");
        assert_ok!(store.set_client_identifier(computer.id, "anydesk", "555").await);

        let keys: Vec<String> = store
            .list_client_identifiers(computer.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.key)
            .collect();
        assert_eq!(keys, vec!["anydesk", "teamviewer"]);

        let too_long = "x".repeat(129);
        for (key, value) in [("Team Viewer", "1"), ("", "1"), ("anydesk", ""), ("anydesk", too_long.as_str())] {
            let err = assert_err!(store.set_client_identifier(computer.id, key, value).await);
            assert_eq!(ErrorKind::of(&err), ErrorKind::Validation, "{:?}", key);
        }
        let err = assert_err!(store.set_client_identifier(9999, "anydesk", "1").await);
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);

        assert_ok!(store.delete_client_identifier(computer.id, "anydesk").await);
        let err = assert_err!(store.delete_client_identifier(computer.id, "anydesk").await);
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_status_keys() {
        let store = test_store().await;
        add_status_key(&store, "uptime", "Uptime", StatusDataType::Int).await;
        add_status_key(&store, "disk", "Disk usage", StatusDataType::DiskUsage).await;

        let err = assert_err!(
            store
                .create_status_key(&CreateStatusKeyRequest {
                    slug: "uptime".to_string(),
                    verbose_name: "Again".to_string(),
                    volatile: true,
                    data_type: StatusDataType::Raw,
                    active: true,
                })
                .await
        );
        assert_eq!(ErrorKind::of(&err), ErrorKind::Validation);
        let err = assert_err!(
            store
                .create_status_key(&CreateStatusKeyRequest {
                    slug: "k".repeat(65),
                    verbose_name: "Long".to_string(),
                    volatile: false,
                    data_type: StatusDataType::Raw,
                    active: true,
                })
                .await
        );
        assert_eq!(ErrorKind::of(&err), ErrorKind::Validation);

        let names: Vec<String> = store
            .list_status_keys()
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.verbose_name)
            .collect();
        assert_eq!(names, vec!["Disk usage", "Uptime"]);

        let key = store.get_status_key("disk").await.unwrap().expect("key exists");
        assert_eq!(key.data_type, StatusDataType::DiskUsage);
        assert!(store.get_status_key("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_and_latest_statuses() {
        let store = test_store().await;
        let computer = add_computer(&store, "lab").await;
        add_status_key(&store, "uptime", "Uptime", StatusDataType::Int).await;
        add_status_key(&store, "disk", "Disk usage", StatusDataType::DiskUsage).await;
        add_status_key(&store, "kernel", "Kernel", StatusDataType::Raw).await;

        assert_ok!(store.record_status(computer.id, "uptime", "100").await);
        assert_ok!(store.record_status(computer.id, "disk", "/\t40.5").await);
        let newest = assert_ok!(store.record_status(computer.id, "uptime", "200").await);
        assert_eq!(newest.display(), StatusValue::Int(200));
        assert_eq!(store.list_statuses(computer.id).await.unwrap().len(), 3);

        let latest = store.latest_statuses(computer.id, &[]).await.unwrap();
        let pairs: Vec<(String, String)> = latest.iter().map(|s| (s.key.clone(), s.value.clone())).collect();
        assert_eq!(
            pairs,
            vec![
                ("disk".to_string(), "/\t40.5".to_string()),
                ("uptime".to_string(), "200".to_string()),
            ]
        );
        assert_eq!(
            latest[0].display(),
            StatusValue::DiskUsage {
                label: "/".to_string(),
                amount: 40.5
            }
        );

        let only_uptime = store.latest_statuses(computer.id, &["uptime".to_string()]).await.unwrap();
        assert_eq!(only_uptime.len(), 1);
        assert_eq!(only_uptime[0].id, newest.id);

        let err = assert_err!(store.record_status(computer.id, "nope", "1").await);
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);
        let err = assert_err!(store.record_status(9999, "uptime", "1").await);
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);

        assert_ok!(store.set_status_key_active("kernel", false).await);
        let err = assert_err!(store.record_status(computer.id, "kernel", "6.1").await);
        assert_eq!(ErrorKind::of(&err), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_computer_delete_cascades_records() {
        let store = test_store().await;
        let lab = add_computer(&store, "lab").await;
        let desk = add_computer(&store, "desk").await;
        add_status_key(&store, "uptime", "Uptime", StatusDataType::Int).await;

        for computer_id in [lab.id, desk.id] {
            store
                .create_work_note(&CreateWorkNoteRequest {
                    computer_id: Some(computer_id),
                    value: "note".to_string(),
                    author: None,
                })
                .await
                .unwrap();
            store
                .create_licence(&CreateLicenceRequest {
                    computer_id: Some(computer_id),
                    value: "KEY".to_string(),
                })
                .await
                .unwrap();
            store.set_client_identifier(computer_id, "anydesk", "1").await.unwrap();
            store.record_status(computer_id, "uptime", "5").await.unwrap();
        }

        assert_ok!(store.delete_computer(lab.id).await);

        assert!(store.list_work_notes(lab.id).await.unwrap().is_empty());
        assert!(store.list_licences(lab.id).await.unwrap().is_empty());
        assert!(store.list_client_identifiers(lab.id).await.unwrap().is_empty());
        assert!(store.list_statuses(lab.id).await.unwrap().is_empty());
        // deleted, not detached
        assert!(store.list_unattached_work_notes().await.unwrap().is_empty());
        assert!(store.list_unattached_licences().await.unwrap().is_empty());

        assert_eq!(store.list_work_notes(desk.id).await.unwrap().len(), 1);
        assert_eq!(store.list_licences(desk.id).await.unwrap().len(), 1);
        assert_eq!(store.list_client_identifiers(desk.id).await.unwrap().len(), 1);
        assert_eq!(store.list_statuses(desk.id).await.unwrap().len(), 1);
        assert!(store.get_status_key("uptime").await.unwrap().is_some());
    }
}
