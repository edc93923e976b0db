//! `tavern init` and `tavern users add|list`

use super::App;
use crate::table::new_table;
use anyhow::Result;
use tavern_characters::ActorRole;

pub fn run_init(app: &App, gm: Option<&str>) -> Result<()> {
    println!(
        "Database ready at {}.",
        app.config.database.display()
    );
    if let Some(name) = gm {
        run_add(app, name, true)?;
    }
    Ok(())
}

pub fn run_add(app: &App, name: &str, gm: bool) -> Result<()> {
    let role = if gm { ActorRole::Gm } else { ActorRole::Player };
    let user = app.users.add_user(name, role)?;
    println!("Registered {} '{}' with id {}.", user.role, user.username, user.id);
    Ok(())
}

pub fn run_list(app: &App, json: bool) -> Result<()> {
    let users = app.users.list_users()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }
    if users.is_empty() {
        println!("No users registered. Add one with `tavern users add <name> --gm`.");
        return Ok(());
    }

    let mut table = new_table();
    table.set_header(vec!["ID", "Username", "Role"]);
    for user in &users {
        table.add_row(vec![
            user.id.to_string(),
            user.username.clone(),
            user.role.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::setup_app;

    #[test]
    fn test_add_user_roles() {
        let (_dir, app) = setup_app();
        run_add(&app, "bree", false).unwrap();
        let bree = app.users.find_by_name("bree").unwrap().unwrap();
        assert_eq!(bree.role, ActorRole::Player);
        assert!(run_add(&app, "bree", true).is_err());
    }

    #[test]
    fn test_init_registers_gm() {
        let (_dir, app) = setup_app();
        run_init(&app, Some("keeper")).unwrap();
        let keeper = app.users.find_by_name("keeper").unwrap().unwrap();
        assert_eq!(keeper.role, ActorRole::Gm);
    }
}
