use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_u16,
    parse_u32, parse_u64,
};
use super::types::{
    ApiSettings, ConfigError, CorsSettings, DatabaseSettings, GradingSettings, RedisSettings,
    RuntimeSettings, SandboxSettings, ServerHost, ServerPort, ServerSettings, Settings,
    TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("GRADEPOINT_HOST", "0.0.0.0");
        let port = env_or_default("GRADEPOINT_PORT", "8000");

        let environment = parse_environment(
            env_optional("GRADEPOINT_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("GRADEPOINT_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "GradePoint Grading API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "gradepoint");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "gradepoint_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let sandbox_base_url =
            env_or_default("SANDBOX_BASE_URL", "https://emkc.org/api/v2/piston");
        let sandbox_timeout_seconds =
            parse_u64("SANDBOX_TIMEOUT_SECONDS", env_or_default("SANDBOX_TIMEOUT_SECONDS", "30"))?;
        let sandbox_run_timeout_ms =
            parse_u64("SANDBOX_RUN_TIMEOUT_MS", env_or_default("SANDBOX_RUN_TIMEOUT_MS", "10000"))?;
        let sandbox_max_retries =
            parse_u32("SANDBOX_MAX_RETRIES", env_or_default("SANDBOX_MAX_RETRIES", "2"))?;
        let sandbox_retry_delay_ms =
            parse_u64("SANDBOX_RETRY_DELAY_MS", env_or_default("SANDBOX_RETRY_DELAY_MS", "500"))?;

        let max_concurrent_executions = parse_u64(
            "GRADING_MAX_CONCURRENT_EXECUTIONS",
            env_or_default("GRADING_MAX_CONCURRENT_EXECUTIONS", "5"),
        )?;
        let trigger_rate_limit =
            parse_u64("GRADING_RATE_LIMIT", env_or_default("GRADING_RATE_LIMIT", "10"))?;
        let trigger_rate_window_seconds = parse_u64(
            "GRADING_RATE_WINDOW_SECONDS",
            env_or_default("GRADING_RATE_WINDOW_SECONDS", "60"),
        )?;

        let log_level = env_or_default("GRADEPOINT_LOG_LEVEL", "info");
        let json = env_optional("GRADEPOINT_LOG_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let prometheus_enabled = env_optional("PROMETHEUS_ENABLED")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            sandbox: SandboxSettings {
                base_url: sandbox_base_url.trim_end_matches('/').to_string(),
                timeout_seconds: sandbox_timeout_seconds,
                run_timeout_ms: sandbox_run_timeout_ms,
                max_retries: sandbox_max_retries,
                retry_delay_ms: sandbox_retry_delay_ms,
            },
            grading: GradingSettings {
                max_concurrent_executions,
                trigger_rate_limit,
                trigger_rate_window_seconds,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn sandbox(&self) -> &SandboxSettings {
        &self.sandbox
    }

    pub(crate) fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.grading.max_concurrent_executions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_MAX_CONCURRENT_EXECUTIONS",
                value: "0".to_string(),
            });
        }

        if self.sandbox.run_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SANDBOX_RUN_TIMEOUT_MS",
                value: "0".to_string(),
            });
        }

        if self.sandbox.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SANDBOX_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.sandbox.base_url.is_empty() {
            return Err(ConfigError::MissingSecret("SANDBOX_BASE_URL"));
        }

        Ok(())
    }
}
