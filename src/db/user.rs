use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: i64,
}

/// Fields supplied at registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
}

/// Partial profile update. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.middle_name.is_none() && self.last_name.is_none()
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    first_name: String,
    middle_name: Option<String>,
    last_name: String,
    is_active: i32,
    is_superuser: i32,
    created_at: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            middle_name: row.middle_name,
            last_name: row.last_name,
            is_active: row.is_active != 0,
            is_superuser: row.is_superuser != 0,
            created_at: row.created_at,
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new inactive user.
    pub async fn create(&self, new: &NewUser, now: i64) -> Result<User, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        insert_user(&mut *conn, new, now).await
    }

    /// Create an inactive user for a registration attempt.
    ///
    /// An existing inactive user with the same e-mail is deleted first, along
    /// with its codes and tokens. Returns `None` if an active user already owns
    /// the address.
    pub async fn register_pending(
        &self,
        new: &NewUser,
        now: i64,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Open with a write so the transaction takes the write lock up front.
        sqlx::query("DELETE FROM users WHERE email = ? AND is_active = 0")
            .bind(&new.email)
            .execute(&mut *tx)
            .await?;

        let user = match insert_user(&mut *tx, new, now).await {
            Ok(user) => user,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tx.rollback().await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        tx.commit().await?;
        Ok(Some(user))
    }

    /// Mark a user active (after register verification).
    pub async fn activate(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET is_active = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, first_name, middle_name, last_name, is_active, is_superuser, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by e-mail, ignoring case.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, first_name, middle_name, last_name, is_active, is_superuser, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Apply the present fields of `update`. Returns the updated user, or
    /// `None` if no such user exists.
    pub async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                first_name = COALESCE(?, first_name),
                middle_name = COALESCE(?, middle_name),
                last_name = COALESCE(?, last_name)
             WHERE id = ?",
        )
        .bind(update.first_name.as_deref())
        .bind(update.middle_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_by_id(id).await
    }

    /// Grant or revoke the superuser flag by e-mail.
    pub async fn set_superuser(&self, email: &str, superuser: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET is_superuser = ? WHERE email = ?")
            .bind(superuser as i32)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user by ID. Codes and refresh tokens cascade.
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all active users, oldest first.
    pub async fn list_active(&self) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, email, first_name, middle_name, last_name, is_active, is_superuser, created_at FROM users WHERE is_active = 1 ORDER BY created_at, email",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}

async fn insert_user(
    conn: &mut sqlx::SqliteConnection,
    new: &NewUser,
    now: i64,
) -> Result<User, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO users (id, email, first_name, middle_name, last_name, is_active, is_superuser, created_at)
         VALUES (?, ?, ?, ?, ?, 0, 0, ?)",
    )
    .bind(&id)
    .bind(&new.email)
    .bind(&new.first_name)
    .bind(new.middle_name.as_deref())
    .bind(&new.last_name)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(User {
        id,
        email: new.email.clone(),
        first_name: new.first_name.clone(),
        middle_name: new.middle_name.clone(),
        last_name: new.last_name.clone(),
        is_active: false,
        is_superuser: false,
        created_at: now,
    })
}
