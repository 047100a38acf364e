#![allow(dead_code)]

use db::{schema::Participant, DbConn};
use lifecycle::{
    test_util::{self, FakeHosts},
    Cleaner, Engine, LifecycleConfig,
};
use provision_api::{Exercise, ExerciseKind};
use std::sync::Arc;

pub struct Env {
    pub db: DbConn,
    pub hosts: FakeHosts,
    pub engine: Engine,
    pub cleaner: Cleaner,
}

pub fn env() -> Env {
    env_with(test_util::test_config())
}

pub fn env_with(config: LifecycleConfig) -> Env {
    util::log::setup();
    let db = db::connect_memory();
    let hosts = FakeHosts::new();
    let svc = hosts.services(db.clone());
    let config = Arc::new(config);
    Env {
        engine: Engine::new(svc.clone(), Arc::clone(&config)),
        cleaner: Cleaner::new(svc, config),
        db,
        hosts,
    }
}

/// Exercise `E` with template repository `tmpl/E`
pub fn exercise(kind: ExerciseKind) -> Exercise {
    Exercise {
        id: 1,
        title: "Exercise".to_string(),
        course_short_name: "algo".to_string(),
        project_key: "E".to_string(),
        template_repository: format!("{}/tmpl/E", test_util::HOST).parse().unwrap(),
        kind,
        start_date: None,
        due_date: None,
    }
}

pub fn user(login: &str) -> Participant {
    Participant::User {
        id: uuid::Uuid::new_v4(),
        login: login.to_string(),
    }
}

pub fn team(id: i32, short_name: &str) -> Participant {
    Participant::Team {
        id,
        short_name: short_name.to_string(),
    }
}
