//! Member repository
//!
//! [`MemberRepo`] is the capability handed to the HTTP layer. Its only
//! implementation, [`MemberRepository`], is stateless apart from injected
//! handles: a [`MemberStore`], an ID generator, a credential verifier and a
//! clock. Each method opens exactly one scope through the coordinator in
//! [`crate::db::transaction`]: mutations run in a transaction, reads in a
//! read-only session.
//!
//! # Example
//!
//! ```
//! use memberbase_shared::db::context::ExecContext;
//! use memberbase_shared::db::memory::MemoryStore;
//! use memberbase_shared::models::member::CreateMember;
//! use memberbase_shared::repository::{MemberRepo, MemberRepository};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), memberbase_shared::error::MemberError> {
//! let repo = MemberRepository::new(Arc::new(MemoryStore::new()));
//! let ctx = ExecContext::background();
//!
//! let member = repo
//!     .create_member(
//!         &ctx,
//!         CreateMember {
//!             username: "alice".to_string(),
//!             password_hash: "$argon2id$...".to_string(),
//!             full_name: "Alice Liddell".to_string(),
//!             member_type: "Gold Member".to_string(),
//!             email: Some("alice@example.com".to_string()),
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//!
//! assert!(member.id.starts_with("Member-"));
//! assert_eq!(member.member_type, "gold-member");
//! # Ok(())
//! # }
//! ```

pub mod collaborators;

use crate::auth::password::Argon2Verifier;
use crate::db::context::ExecContext;
use crate::db::filter::{build_criteria, registration_conflicts, Predicate};
use crate::db::store::MemberStore;
use crate::db::transaction::{with_transaction, without_transaction};
use crate::error::{MemberError, ValidationError};
use crate::models::member::{member_id, non_blank, slugify, CreateMember, MemberAuthRequest, MemberRecord};
use crate::models::search::{MemberField, MemberPage, PageRequest};
use async_trait::async_trait;
use chrono::{FixedOffset, Offset, Utc};
use collaborators::{Clock, CredentialVerifier, IdGenerator, SystemClock, UuidIdGenerator};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Default offset for `last_login_at`: UTC+07:00
pub const DEFAULT_LOGIN_OFFSET_SECONDS: i32 = 7 * 3600;

/// Member operations available to callers
#[async_trait]
pub trait MemberRepo: Send + Sync {
    /// Registers a member
    ///
    /// # Errors
    ///
    /// - `Validation` for missing fields or no phone/email (no store access)
    /// - `Duplicate` if the username, phone number or email is taken
    async fn create_member(&self, ctx: &ExecContext, data: CreateMember)
        -> Result<MemberRecord, MemberError>;

    /// Verifies a login and records it
    ///
    /// # Errors
    ///
    /// - `Authentication` for an unknown username or wrong credential
    /// - `Suspended` for a correct credential on a suspended account
    async fn authenticate(
        &self,
        ctx: &ExecContext,
        request: MemberAuthRequest,
    ) -> Result<MemberRecord, MemberError>;

    async fn find_one_by_id(&self, ctx: &ExecContext, id: &str) -> Result<MemberRecord, MemberError>;

    /// Replaces a member's record (last writer wins)
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank username, full name or member type, or no
    ///   phone/email (no store access)
    /// - `NotFound` if no member has the record's ID
    async fn update_member(&self, ctx: &ExecContext, member: MemberRecord)
        -> Result<MemberRecord, MemberError>;

    /// One page of members matching the request's keyword criteria
    async fn find_all(
        &self,
        ctx: &ExecContext,
        request: PageRequest,
    ) -> Result<MemberPage<MemberRecord>, MemberError>;

    /// Checks that the store is reachable
    async fn ping(&self, ctx: &ExecContext) -> Result<(), MemberError>;

    /// Offset `last_login_at` is recorded in
    fn login_offset(&self) -> FixedOffset;
}

/// [`MemberRepo`] over any [`MemberStore`]
pub struct MemberRepository<S: MemberStore> {
    store: Arc<S>,
    ids: Arc<dyn IdGenerator>,
    verifier: Arc<dyn CredentialVerifier>,
    clock: Arc<dyn Clock>,
    login_offset: FixedOffset,
}

impl<S: MemberStore> MemberRepository<S> {
    /// Repository with UUID IDs, Argon2id verification, the system clock and
    /// the default login offset
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            ids: Arc::new(UuidIdGenerator),
            verifier: Arc::new(Argon2Verifier),
            clock: Arc::new(SystemClock),
            login_offset: FixedOffset::east_opt(DEFAULT_LOGIN_OFFSET_SECONDS)
                .unwrap_or_else(|| Utc.fix()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_login_offset(mut self, offset: FixedOffset) -> Self {
        self.login_offset = offset;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

/// Runs the (CPU-heavy) credential check off the async workers
async fn check_credential(
    verifier: Arc<dyn CredentialVerifier>,
    credential: String,
    hash: String,
) -> Result<bool, MemberError> {
    tokio::task::spawn_blocking(move || verifier.verify(&credential, &hash))
        .await
        .map_err(|e| MemberError::Credential(e.to_string()))?
        .map_err(|e| MemberError::Credential(e.to_string()))
}

/// Verifies `credential` against the verifier's decoy hash and discards the
/// outcome
async fn check_decoy(verifier: Arc<dyn CredentialVerifier>, credential: String) {
    let checked = tokio::task::spawn_blocking(move || {
        let hash = verifier.decoy_hash();
        verifier.verify(&credential, &hash)
    })
    .await;

    if let Err(e) = checked {
        warn!(error = %e, "Decoy credential check failed");
    }
}

fn by_id(id: &str) -> Predicate {
    Predicate::eq_text(MemberField::Id, id)
}

#[async_trait]
impl<S: MemberStore> MemberRepo for MemberRepository<S> {
    #[instrument(skip(self, ctx, data), fields(trace_id = %ctx.trace_id(), username = %data.username))]
    async fn create_member(
        &self,
        ctx: &ExecContext,
        mut data: CreateMember,
    ) -> Result<MemberRecord, MemberError> {
        let id = member_id(&self.ids.generate());
        data.member_type = slugify(&data.member_type);
        data.validate()?;

        let record = MemberRecord::new(id, data, self.clock.now());
        let store = Arc::clone(&self.store);

        let created = with_transaction(ctx, self.store.as_ref(), move |conn| {
            Box::pin(async move {
                if store.count(conn, &registration_conflicts(&record)).await? > 0 {
                    return Err(MemberError::Duplicate);
                }
                store.insert_one(conn, &record).await?;
                Ok(record)
            })
        })
        .await;

        match &created {
            Ok(member) => info!(member_id = %member.id, "Member created"),
            Err(MemberError::Duplicate) => info!("Registration rejected: data already taken"),
            Err(e) => warn!(error = %e, "Member creation failed"),
        }
        created
    }

    #[instrument(skip(self, ctx, request), fields(trace_id = %ctx.trace_id(), username = %request.username))]
    async fn authenticate(
        &self,
        ctx: &ExecContext,
        request: MemberAuthRequest,
    ) -> Result<MemberRecord, MemberError> {
        let store = Arc::clone(&self.store);
        let verifier = Arc::clone(&self.verifier);
        let clock = Arc::clone(&self.clock);
        let offset = self.login_offset;

        let result = with_transaction(ctx, self.store.as_ref(), move |conn| {
            Box::pin(async move {
                let MemberAuthRequest {
                    username,
                    password,
                    device_id,
                    push_token,
                } = request;

                let member = match store
                    .find_one(conn, &Predicate::eq_text(MemberField::Username, username.trim()))
                    .await?
                {
                    Some(member) => member,
                    None => {
                        check_decoy(verifier, password).await;
                        return Err(MemberError::Authentication);
                    }
                };

                if !check_credential(verifier, password, member.password_hash.clone()).await? {
                    return Err(MemberError::Authentication);
                }
                if member.is_suspended {
                    return Err(MemberError::Suspended);
                }

                let mut current = store
                    .find_one(conn, &by_id(&member.id))
                    .await?
                    .ok_or_else(|| MemberError::NotFound(member.id.clone()))?;

                let now = clock.now();
                current.last_login_at = Some(now.with_timezone(&offset));
                if let Some(device_id) = non_blank(device_id) {
                    current.device_id = Some(device_id);
                }
                if let Some(push_token) = non_blank(push_token) {
                    current.push_token = Some(push_token);
                }
                current.updated_at = now;

                if !store.replace_one(conn, &current).await? {
                    return Err(MemberError::NotFound(current.id));
                }
                Ok(current)
            })
        })
        .await;

        match &result {
            Ok(member) => info!(member_id = %member.id, "Member logged in"),
            Err(MemberError::Authentication) => info!("Login rejected: bad credentials"),
            Err(MemberError::Suspended) => info!("Login rejected: account suspended"),
            Err(e) => warn!(error = %e, "Login failed"),
        }
        result
    }

    #[instrument(skip(self, ctx), fields(trace_id = %ctx.trace_id()))]
    async fn find_one_by_id(&self, ctx: &ExecContext, id: &str) -> Result<MemberRecord, MemberError> {
        let store = Arc::clone(&self.store);
        let filter = by_id(id);

        let found = without_transaction(ctx, self.store.as_ref(), move |conn| {
            Box::pin(async move { Ok::<_, MemberError>(store.find_one(conn, &filter).await?) })
        })
        .await?;

        found.ok_or_else(|| MemberError::NotFound(id.to_string()))
    }

    #[instrument(skip(self, ctx, member), fields(trace_id = %ctx.trace_id(), member_id = %member.id))]
    async fn update_member(
        &self,
        ctx: &ExecContext,
        member: MemberRecord,
    ) -> Result<MemberRecord, MemberError> {
        let mut member = member.normalized();
        member.username = member.username.trim().to_string();
        member.full_name = member.full_name.trim().to_string();
        if member.username.is_empty() {
            return Err(ValidationError::MissingField("username").into());
        }
        if member.full_name.is_empty() {
            return Err(ValidationError::MissingField("full_name").into());
        }
        member.member_type = slugify(&member.member_type);
        if member.member_type.is_empty() {
            return Err(ValidationError::MissingField("member_type").into());
        }
        member.validate_contact()?;

        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);

        let updated = with_transaction(ctx, self.store.as_ref(), move |conn| {
            Box::pin(async move {
                let existing = store
                    .find_one(conn, &by_id(&member.id))
                    .await?
                    .ok_or_else(|| MemberError::NotFound(member.id.clone()))?;

                member.created_at = existing.created_at;
                member.updated_at = clock.now();

                if !store.replace_one(conn, &member).await? {
                    return Err(MemberError::NotFound(member.id));
                }
                Ok(member)
            })
        })
        .await?;

        debug!(member_id = %updated.id, "Member updated");
        Ok(updated)
    }

    #[instrument(skip(self, ctx, request), fields(trace_id = %ctx.trace_id(), page = request.page, size = request.size))]
    async fn find_all(
        &self,
        ctx: &ExecContext,
        request: PageRequest,
    ) -> Result<MemberPage<MemberRecord>, MemberError> {
        let offset = request.offset()?;
        let limit = request.size;
        let sort = request.sort_or_default();
        let filter = Predicate::all_of(vec![build_criteria(&request.criteria, true, self.clock.now())]);

        let store = Arc::clone(&self.store);
        let page = without_transaction(ctx, self.store.as_ref(), move |conn| {
            Box::pin(async move {
                let members = store.find_many(conn, &filter, &sort, limit, offset).await?;
                let total = store.count(conn, &filter).await?;
                Ok::<_, MemberError>(MemberPage { members, total })
            })
        })
        .await?;

        debug!(returned = page.members.len(), total = page.total, "Members listed");
        Ok(page)
    }

    #[instrument(skip(self, ctx), fields(trace_id = %ctx.trace_id()))]
    async fn ping(&self, ctx: &ExecContext) -> Result<(), MemberError> {
        let store = Arc::clone(&self.store);
        without_transaction(ctx, self.store.as_ref(), move |conn| {
            Box::pin(async move { Ok::<_, MemberError>(store.ping(conn).await?) })
        })
        .await
    }

    fn login_offset(&self) -> FixedOffset {
        self.login_offset
    }
}
