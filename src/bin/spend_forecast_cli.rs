use std::{env, error::Error, fmt, process, str::FromStr};

use chrono::NaiveDate;
use colored::Colorize;
use uuid::Uuid;

use spend_forecast::{
    config::{ConfigManager, ForecastConfig},
    errors::ForecastError,
    forecast::{ForecastRequest, ForecastService},
    init,
    ledger::{Expense, ExpensePatch},
    storage::{JsonExpenseStore, JsonModelStore, ModelStore},
    utils::build_info,
};

fn main() {
    init();

    if let Err(err) = run() {
        eprintln!("Error: {err}");
        process::exit(exit_code(err.as_ref()));
    }
}

/// 2 for rejected arguments, 1 for everything else.
fn exit_code(err: &(dyn Error + 'static)) -> i32 {
    match err.downcast_ref::<ForecastError>() {
        Some(err) if err.is_validation() => 2,
        _ => 1,
    }
}

fn usage_error() -> ! {
    print_usage();
    process::exit(2);
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let command = args.next().unwrap_or_else(|| usage_error());
    let rest: Vec<String> = args.collect();

    let manager = ConfigManager::new()?;
    let config = manager.load()?;

    match command.as_str() {
        "add" => add_expense(&manager, &config, &rest)?,
        "list" => list_expenses(&manager, &config)?,
        "show" => show_expense(&manager, &config, &rest)?,
        "update" => update_expense(&manager, &config, &rest)?,
        "totals" => list_totals(&manager, &config)?,
        "remove" => remove_expense(&manager, &config, &rest)?,
        "forecast" => run_forecast(&manager, &config, &rest)?,
        "models" => list_models(&manager, &config)?,
        "config" => println!("{}", serde_json::to_string_pretty(&config)?),
        "version" => println!("{}", build_info::current().summary()),
        _ => usage_error(),
    }

    Ok(())
}

fn expense_store(
    manager: &ConfigManager,
    config: &ForecastConfig,
) -> Result<JsonExpenseStore, Box<dyn Error>> {
    Ok(JsonExpenseStore::new(
        Some(manager.base_dir().to_path_buf()),
        Some(config.backup_retention),
    )?)
}

fn model_store(
    manager: &ConfigManager,
    config: &ForecastConfig,
) -> Result<JsonModelStore, Box<dyn Error>> {
    Ok(JsonModelStore::new(manager.model_dir(config))?)
}

fn add_expense(
    manager: &ConfigManager,
    config: &ForecastConfig,
    args: &[String],
) -> Result<(), Box<dyn Error>> {
    let (date, amount, description) = match args {
        [date, amount, description, ..] => (date, amount, description),
        _ => usage_error(),
    };
    let date = parse_date(date)?;
    let amount = parse_amount(amount)?;
    let category = args.get(3).cloned();

    let store = expense_store(manager, config)?;
    let mut book = store.load()?;
    let id = book.add(Expense::new(date, description.as_str(), amount, category)?)?;
    store.save(&book)?;
    println!("Added expense {id}");
    Ok(())
}

fn list_expenses(manager: &ConfigManager, config: &ForecastConfig) -> Result<(), Box<dyn Error>> {
    let book = expense_store(manager, config)?.load()?;
    if book.is_empty() {
        println!("No expenses recorded.");
        return Ok(());
    }
    println!(
        "{}",
        format!(
            "{:<36}  {:<10}  {:>10}  {:<12}  {}",
            "ID", "Date", "Amount", "Category", "Description"
        )
        .bold()
    );
    for expense in book.list() {
        println!(
            "{:<36}  {:<10}  {:>10.2}  {:<12}  {}",
            expense.id,
            expense.date.format("%Y-%m-%d"),
            expense.amount,
            expense.category.as_deref().unwrap_or("-"),
            expense.description
        );
    }
    Ok(())
}

fn remove_expense(
    manager: &ConfigManager,
    config: &ForecastConfig,
    args: &[String],
) -> Result<(), Box<dyn Error>> {
    let id = parse_id(args.first())?;
    let store = expense_store(manager, config)?;
    let mut book = store.load()?;
    match book.remove(id) {
        Some(expense) => {
            store.save(&book)?;
            println!("Removed expense {} ({})", expense.id, expense.description);
            Ok(())
        }
        None => Err(format!("expense {id} not found").into()),
    }
}

fn show_expense(
    manager: &ConfigManager,
    config: &ForecastConfig,
    args: &[String],
) -> Result<(), Box<dyn Error>> {
    let id = parse_id(args.first())?;
    let book = expense_store(manager, config)?.load()?;
    let expense = book
        .get(id)
        .ok_or_else(|| format!("expense {id} not found"))?;
    print_field("ID:", expense.id);
    print_field("Date:", expense.date.format("%Y-%m-%d"));
    print_field("Amount:", format!("{:.2}", expense.amount));
    print_field("Category:", expense.category.as_deref().unwrap_or("-"));
    print_field("Description:", &expense.description);
    Ok(())
}

fn print_field(label: &str, value: impl fmt::Display) {
    println!("{}{}", format!("{label:<13}").bold(), value);
}

fn update_expense(
    manager: &ConfigManager,
    config: &ForecastConfig,
    args: &[String],
) -> Result<(), Box<dyn Error>> {
    let id = parse_id(args.first())?;
    let mut patch = ExpensePatch::default();
    let mut iter = args.iter().skip(1);
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--date" => patch.date = Some(parse_date(&flag_value(flag, iter.next())?)?),
            "--amount" => patch.amount = Some(parse_amount(&flag_value(flag, iter.next())?)?),
            "--description" => patch.description = Some(flag_value(flag, iter.next())?),
            "--category" => patch.category = Some(flag_value(flag, iter.next())?),
            other => return Err(unknown_option(other).into()),
        }
    }

    let store = expense_store(manager, config)?;
    let mut book = store.load()?;
    if book.get(id).is_none() {
        return Err(format!("expense {id} not found").into());
    }
    let description = book.update(id, patch)?.description.clone();
    store.save(&book)?;
    println!("Updated expense {id} ({description})");
    Ok(())
}

fn list_totals(manager: &ConfigManager, config: &ForecastConfig) -> Result<(), Box<dyn Error>> {
    let totals = expense_store(manager, config)?.load()?.total_by_date();
    if totals.is_empty() {
        println!("No expenses recorded.");
        return Ok(());
    }
    println!("{}", format!("{:<10}  {:>10}", "Date", "Total").bold());
    for (date, total) in totals {
        println!("{:<10}  {:>10.2}", date.format("%Y-%m-%d"), total);
    }
    Ok(())
}

fn run_forecast(
    manager: &ConfigManager,
    config: &ForecastConfig,
    args: &[String],
) -> Result<(), Box<dyn Error>> {
    let mut periods = config.default_periods.to_string();
    let mut frequency = config.default_frequency.clone();
    let mut model = config.default_model.clone();
    let mut name = None;
    let mut retrain = false;

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--periods" => periods = flag_value(flag, iter.next())?,
            "--freq" => frequency = flag_value(flag, iter.next())?,
            "--model" => model = flag_value(flag, iter.next())?,
            "--name" => name = Some(flag_value(flag, iter.next())?),
            "--retrain" => retrain = true,
            other => return Err(unknown_option(other).into()),
        }
    }

    let mut request = ForecastRequest::parse(&periods, &frequency, &model)?.with_retrain(retrain);
    if let Some(name) = name {
        request = request.with_model_name(name);
    }

    let source = expense_store(manager, config)?;
    let service = ForecastService::from_config(model_store(manager, config)?, config);
    let outcome = service.run(&source, &request)?;
    println!("{}", outcome.to_json_pretty()?);
    Ok(())
}

fn flag_value(flag: &str, value: Option<&String>) -> Result<String, ForecastError> {
    value
        .cloned()
        .ok_or_else(|| ForecastError::InvalidInput(format!("option `{flag}` expects a value")))
}

fn unknown_option(option: &str) -> ForecastError {
    ForecastError::InvalidInput(format!("unknown option `{option}`"))
}

fn parse_id(raw: Option<&String>) -> Result<Uuid, ForecastError> {
    let raw = raw.unwrap_or_else(|| usage_error());
    Uuid::parse_str(raw)
        .map_err(|_| ForecastError::InvalidInput(format!("invalid expense id `{raw}`")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, ForecastError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| ForecastError::InvalidInput(format!("invalid date `{raw}`: {err}")))
}

fn parse_amount(raw: &str) -> Result<f64, ForecastError> {
    f64::from_str(raw).map_err(|_| ForecastError::InvalidInput(format!("invalid amount `{raw}`")))
}

fn list_models(manager: &ConfigManager, config: &ForecastConfig) -> Result<(), Box<dyn Error>> {
    let models = model_store(manager, config)?.list()?;
    if models.is_empty() {
        println!("No stored models.");
        return Ok(());
    }
    println!(
        "{}",
        format!("{:<24}  {:<8}  {:<4}  {}", "Name", "Kind", "Freq", "Saved").bold()
    );
    for info in models {
        println!(
            "{:<24}  {:<8}  {:<4}  {}",
            info.name,
            info.kind.to_string(),
            info.frequency.code(),
            info.saved_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn print_usage() {
    eprintln!(
        "Usage: spend_forecast_cli <command>\n\
         Commands:\n  \
         add <YYYY-MM-DD> <amount> <description> [category]\n  \
         list\n  \
         show <id>\n  \
         update <id> [--date YYYY-MM-DD] [--amount A] [--description TEXT] [--category C]\n  \
         totals\n  \
         remove <id>\n  \
         forecast [--periods N] [--freq D|W|MS|QS] [--model primary|fallback] [--name NAME] [--retrain]\n  \
         models\n  \
         config\n  \
         version"
    );
}
