// src/constants.rs

/// The name of the directory holding schema records (inside the base directory).
pub const SCHEMAS_DIR: &str = "schemas";

/// The name of the directory holding project records.
pub const PROJECTS_DIR: &str = "projects";

/// The name of the directory holding config sheet records.
pub const SHEETS_DIR: &str = "sheets";

/// The name of the per-kind lookup index file.
pub const INDEX_FILENAME: &str = "index.json";

/// The extension of every entity record file (`<uuid>.json`).
pub const ENTITY_FILE_EXTENSION: &str = "json";

/// The name of the optional settings file (inside the base directory).
pub const SETTINGS_FILENAME: &str = "config.toml";

/// The name of the base directory when no override is given (in the home directory).
pub const DEFAULT_HOME_DIRNAME: &str = ".ee";

/// Environment variable overriding the base directory.
pub const ENV_HOME: &str = "EE_HOME";

/// Environment variable overriding the remote API base URL.
pub const ENV_API_URL: &str = "EE_API_URL";

/// Environment variable holding the remote API key. Setting it enables the API.
pub const ENV_API_KEY: &str = "EE_API_KEY";

/// The remote API base URL used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Reference prefix for explicitly local entities (`local://name`).
pub const LOCAL_REF_PREFIX: &str = "local://";

/// Reference prefix for remote entities (`remote://name`). Not resolvable locally.
pub const REMOTE_REF_PREFIX: &str = "remote://";
