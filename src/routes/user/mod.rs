mod handler;
mod model;

pub use handler::{
    create_user,
    current_user,
    list_users,
    login,
    logout,
    register,
    request_password_reset,
    reset_password,
};
pub use model::{Role, User};
