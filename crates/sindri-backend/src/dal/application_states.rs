/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use diesel::prelude::*;
use sindri_models::models::ApplicationState;
use sindri_models::schema::application_states;

use crate::dal::{DbResult, DAL};

pub struct ApplicationStatesDAL<'a> {
    pub dal: &'a DAL,
}

impl ApplicationStatesDAL<'_> {
    pub fn create(&self, state: &ApplicationState) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(application_states::table)
            .values(state)
            .execute(conn)?;
        Ok(())
    }

    pub fn get(&self, application_id: &str) -> DbResult<Option<ApplicationState>> {
        let conn = &mut self.dal.conn()?;
        Ok(application_states::table
            .filter(application_states::applicationstate_application_id.eq(application_id))
            .first(conn)
            .optional()?)
    }

    pub fn update(&self, state: &ApplicationState) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::update(
            application_states::table.filter(
                application_states::applicationstate_application_id
                    .eq(&state.applicationstate_application_id),
            ),
        )
        .set(state)
        .execute(conn)?)
    }

    pub fn delete(&self, application_id: &str) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::delete(
            application_states::table
                .filter(application_states::applicationstate_application_id.eq(application_id)),
        )
        .execute(conn)?)
    }
}
