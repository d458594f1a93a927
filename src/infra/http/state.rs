use std::sync::Arc;

use crate::application::admin::AdminService;
use crate::application::auth::AuthService;
use crate::application::blog::BlogService;
use crate::application::events::EventService;
use crate::application::users::UserService;

#[derive(Clone)]
pub struct ApiState {
    pub users: Arc<UserService>,
    pub auth: Arc<AuthService>,
    pub blog: Arc<BlogService>,
    pub events: Arc<EventService>,
    pub admin: Arc<AdminService>,
}
