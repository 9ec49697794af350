//! Credential capture, storage and the authorization retry loop.

use std::{
    env, fmt, fs,
    future::Future,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

pub const TOKEN_ENV: &str = "TGFWD_BOT_TOKEN";
const MAX_AUTH_ATTEMPTS: usize = 3;

/// Platform credentials. Never logged: `Debug` redacts the token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub bot_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    fn validate(self) -> Result<Self> {
        let token = self.bot_token.trim();
        if token.is_empty() {
            return Err(Error::Auth("bot token is empty".to_string()));
        }
        Ok(Self {
            bot_token: token.to_string(),
        })
    }
}

/// Operator prompts used while capturing credentials.
pub trait Prompter {
    fn ask(&self, label: &str) -> Result<String>;
    /// Like `ask`, without echoing the input.
    fn ask_secret(&self, label: &str) -> Result<String>;
}

/// JSON file holding the credentials between runs.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let creds: Credentials = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("{}: malformed credentials: {e}", self.path.display()))
        })?;
        creds.validate().map(Some)
    }

    /// Write the credentials, readable by the owner only.
    pub fn save(&self, creds: &Credentials) -> Result<()> {
        let body = serde_json::to_string_pretty(creds)?;
        let mut opts = fs::OpenOptions::new();
        opts.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut file = opts.open(&self.path)?;
        file.write_all(body.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    Environment,
    File,
    Prompt,
}

/// Find credentials: environment first, then the store, then the operator.
fn resolve(store: &CredentialStore, prompter: Option<&dyn Prompter>) -> Result<(Credentials, Origin)> {
    if let Some(token) = env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty()) {
        let creds = Credentials { bot_token: token }.validate()?;
        return Ok((creds, Origin::Environment));
    }
    if let Some(creds) = store.load()? {
        return Ok((creds, Origin::File));
    }
    let Some(prompter) = prompter else {
        return Err(Error::Auth(format!(
            "no credentials found (set {TOKEN_ENV} or create {})",
            store.path().display()
        )));
    };
    Ok((capture(prompter)?, Origin::Prompt))
}

fn capture(prompter: &dyn Prompter) -> Result<Credentials> {
    Credentials {
        bot_token: prompter.ask_secret("Bot token: ")?,
    }
    .validate()
}

fn wants_retry(prompter: &dyn Prompter, question: &str) -> Result<bool> {
    let answer = prompter.ask(question)?;
    Ok(!matches!(
        answer.trim().to_lowercase().as_str(),
        "n" | "no" | "q" | "quit"
    ))
}

/// Resolve credentials and open a session with `connect`.
///
/// With a prompter, failures are reported and the operator may retry: an
/// authorization failure asks for new credentials, any other failure retries
/// with the same ones. Without a prompter (headless runs) the first failure
/// is returned. Credentials captured at the prompt are persisted once a
/// session has been opened with them.
pub async fn authorize<T, F, Fut>(
    store: &CredentialStore,
    prompter: Option<&dyn Prompter>,
    mut connect: F,
) -> Result<T>
where
    F: FnMut(Credentials) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let (mut creds, mut origin) = resolve(store, prompter)?;

    for attempt in 1..=MAX_AUTH_ATTEMPTS {
        let err = match connect(creds.clone()).await {
            Ok(session) => {
                if origin == Origin::Prompt {
                    store.save(&creds)?;
                    tracing::info!(path = %store.path().display(), "credentials saved");
                }
                return Ok(session);
            }
            Err(e) => e,
        };

        tracing::error!(attempt, error = %err, "could not open a session");
        let Some(prompter) = prompter else {
            return Err(err);
        };
        if attempt == MAX_AUTH_ATTEMPTS {
            return Err(err);
        }

        if err.is_auth() {
            if !wants_retry(prompter, "Credentials rejected. Enter new ones? [Y/n]: ")? {
                return Err(err);
            }
            creds = capture(prompter)?;
            origin = Origin::Prompt;
        } else if !wants_retry(prompter, "Connection failed. Retry? [Y/n]: ")? {
            return Err(err);
        }
    }

    Err(Error::Auth("too many failed attempts".to_string()))
}

/// Load `KEY=VALUE` pairs from a `.env` file without overriding the environment.
pub fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }

        let mut val = v.trim();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = &val[1..val.len() - 1];
        }

        env::set_var(key, val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, collections::VecDeque};

    /// Scripted answers; `ask` and `ask_secret` share one queue.
    struct Script(RefCell<VecDeque<&'static str>>);

    impl Script {
        fn new(answers: &[&'static str]) -> Self {
            Self(RefCell::new(answers.iter().copied().collect()))
        }
    }

    impl Prompter for Script {
        fn ask(&self, _label: &str) -> Result<String> {
            self.0
                .borrow_mut()
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| Error::External("script exhausted".to_string()))
        }

        fn ask_secret(&self, label: &str) -> Result<String> {
            self.ask(label)
        }
    }

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        (dir, store)
    }

    fn connect_with(valid: &'static str) -> impl FnMut(Credentials) -> std::future::Ready<Result<String>> {
        move |c: Credentials| {
            std::future::ready(if c.bot_token == valid {
                Ok(format!("session:{}", c.bot_token))
            } else {
                Err(Error::Auth("Unauthorized".to_string()))
            })
        }
    }

    #[test]
    fn debug_output_redacts_the_token() {
        let creds = Credentials {
            bot_token: "123:secret".to_string(),
        };
        assert!(!format!("{creds:?}").contains("secret"));
    }

    #[test]
    fn store_round_trips_with_owner_only_permissions() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_none());
        let creds = Credentials {
            bot_token: "123:abc".to_string(),
        };
        store.save(&creds).unwrap();
        assert_eq!(store.load().unwrap(), Some(creds));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    // Tests below that rely on the token env var being unset share one test to avoid races.
    #[tokio::test]
    async fn authorize_flows() {
        env::remove_var(TOKEN_ENV);

        // Prompted credentials are persisted after a successful connect.
        let (_dir, st) = store();
        let prompter = Script::new(&["good"]);
        let session = authorize(&st, Some(&prompter), connect_with("good"))
            .await
            .unwrap();
        assert_eq!(session, "session:good");
        assert_eq!(st.load().unwrap().unwrap().bot_token, "good");

        // Rejected credentials trigger a retry prompt and new capture.
        let (_dir2, st2) = store();
        let prompter = Script::new(&["bad", "y", "good"]);
        authorize(&st2, Some(&prompter), connect_with("good"))
            .await
            .unwrap();
        assert_eq!(st2.load().unwrap().unwrap().bot_token, "good");

        // Declining the retry is fatal and nothing is saved.
        let (_dir3, st3) = store();
        let prompter = Script::new(&["bad", "n"]);
        let err = authorize(&st3, Some(&prompter), connect_with("good"))
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert!(st3.load().unwrap().is_none());

        // Headless: stored credentials that fail are fatal immediately.
        let (_dir4, st4) = store();
        st4.save(&Credentials {
            bot_token: "stale".to_string(),
        })
        .unwrap();
        assert!(authorize(&st4, None, connect_with("good")).await.is_err());

        // Headless with nothing stored cannot prompt.
        let (_dir5, st5) = store();
        let err = authorize(&st5, None, connect_with("good")).await.unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn dotenv_does_not_override_existing_vars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# comment\nTGFWD_TEST_A=\"from file\"\nTGFWD_TEST_B=file\n",
        )
        .unwrap();
        env::set_var("TGFWD_TEST_B", "preset");

        load_dotenv_if_present(&path);
        assert_eq!(env::var("TGFWD_TEST_A").unwrap(), "from file");
        assert_eq!(env::var("TGFWD_TEST_B").unwrap(), "preset");
    }
}
