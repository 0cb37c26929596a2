//! Authenticated actor sessions.
//!
//! A scenario owns one [`Sessions`] value and passes it by reference to every
//! step. Only one actor is logged in at a time on a page; switching actor
//! logs the current one out first.

use crate::driver::{Credentials, NavTarget, TimeModuleDriver};
use crate::error::{Error, Result};
use crate::workflow::Actor;

/// One identity and its navigation context.
#[derive(Debug, Clone)]
pub struct ActorSession {
    pub role: Actor,
    pub credentials: Credentials,
    pub location: Option<NavTarget>,
    pub logged_in: bool,
}

impl ActorSession {
    pub fn new(role: Actor, credentials: Credentials) -> Self {
        Self {
            role,
            credentials,
            location: None,
            logged_in: false,
        }
    }
}

/// The supervisor and (once created) employee sessions of a scenario.
#[derive(Debug)]
pub struct Sessions {
    supervisor: ActorSession,
    employee: Option<ActorSession>,
    active: Option<Actor>,
}

impl Sessions {
    pub fn new(supervisor: Credentials) -> Self {
        Self {
            supervisor: ActorSession::new(Actor::Supervisor, supervisor),
            employee: None,
            active: None,
        }
    }

    /// Registers the employee identity created for the scenario.
    pub fn set_employee(&mut self, credentials: Credentials) {
        self.employee = Some(ActorSession::new(Actor::Employee, credentials));
    }

    /// The actor currently logged in.
    pub fn active(&self) -> Option<Actor> {
        self.active
    }

    pub fn get(&self, role: Actor) -> Option<&ActorSession> {
        match role {
            Actor::Supervisor => Some(&self.supervisor),
            Actor::Employee => self.employee.as_ref(),
        }
    }

    fn get_mut(&mut self, role: Actor) -> Result<&mut ActorSession> {
        match role {
            Actor::Supervisor => Ok(&mut self.supervisor),
            Actor::Employee => self
                .employee
                .as_mut()
                .ok_or_else(|| Error::Session("scenario has no employee identity".to_string())),
        }
    }

    /// Makes `role` the logged-in actor, logging the current one out first.
    pub async fn act_as<D>(&mut self, role: Actor, driver: &D) -> Result<()>
    where
        D: TimeModuleDriver + ?Sized,
    {
        if self.active == Some(role) {
            return Ok(());
        }
        if self.active.is_some() {
            self.close(driver).await?;
        }

        let session = self.get_mut(role)?;
        driver
            .login(&session.credentials)
            .await
            .map_err(|e| Error::Session(format!("login as {} failed: {}", role, e)))?;
        session.logged_in = true;
        session.location = Some(NavTarget::Dashboard);
        self.active = Some(role);
        tracing::debug!(actor = %role, "switched actor");
        Ok(())
    }

    /// Opens `target` as the active actor.
    pub async fn open<D>(&mut self, target: NavTarget, driver: &D) -> Result<()>
    where
        D: TimeModuleDriver + ?Sized,
    {
        let role = self
            .active
            .ok_or_else(|| Error::Session(format!("no actor logged in to open {}", target)))?;
        driver.navigate(target).await?;
        self.get_mut(role)?.location = Some(target);
        Ok(())
    }

    /// Logs the active actor out. A no-op when nobody is logged in.
    pub async fn close<D>(&mut self, driver: &D) -> Result<()>
    where
        D: TimeModuleDriver + ?Sized,
    {
        let Some(role) = self.active.take() else {
            return Ok(());
        };
        let session = self.get_mut(role)?;
        session.logged_in = false;
        session.location = None;
        driver
            .logout()
            .await
            .map_err(|e| Error::Session(format!("logout as {} failed: {}", role, e)))
    }
}
