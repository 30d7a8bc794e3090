//! Form fields shared by the new transaction page and the recurring transaction edit page.

use maud::{Markup, html};
use rusqlite::Connection;
use time::Date;

use crate::{
    Error,
    category::{Category, get_categories},
    html::{
        FORM_LABEL_STYLE, FORM_RADIO_GROUP_STYLE, FORM_RADIO_INPUT_STYLE, FORM_RADIO_LABEL_STYLE,
        FORM_TEXT_INPUT_STYLE,
    },
    recurring::Frequency,
    transaction::TransactionKind,
};

/// The categories a user can pick from, grouped by kind.
#[derive(Debug, Default)]
pub struct CategoryOptions {
    pub income: Vec<Category>,
    pub expense: Vec<Category>,
}

impl CategoryOptions {
    /// Load the categories of both kinds.
    pub fn load(connection: &Connection) -> Result<Self, Error> {
        Ok(Self {
            income: get_categories(TransactionKind::Income, connection)?,
            expense: get_categories(TransactionKind::Expense, connection)?,
        })
    }

    /// Load only the categories of `kind`.
    pub fn for_kind(kind: TransactionKind, connection: &Connection) -> Result<Self, Error> {
        let categories = get_categories(kind, connection)?;

        Ok(match kind {
            TransactionKind::Income => Self {
                income: categories,
                ..Default::default()
            },
            TransactionKind::Expense => Self {
                expense: categories,
                ..Default::default()
            },
        })
    }
}

pub fn name_input(value: Option<&str>) -> Markup {
    html! {
        div
        {
            label for="name" class=(FORM_LABEL_STYLE) { "Name" }

            input
                name="name"
                id="name"
                type="text"
                placeholder="e.g. Rent"
                required
                value=[value]
                class=(FORM_TEXT_INPUT_STYLE);
        }
    }
}

pub fn amount_input(value: Option<f64>, autofocus: bool) -> Markup {
    let amount_str = value.map(|amount| format!("{amount:.2}"));

    html! {
        div
        {
            label for="amount" class=(FORM_LABEL_STYLE) { "Amount" }

            // w-full needed to ensure input takes the full width when prefilled with a value
            div class="input-wrapper w-full"
            {
                input
                    name="amount"
                    id="amount"
                    type="number"
                    step="0.01"
                    min="0.01"
                    placeholder="0.00"
                    required
                    value=[amount_str.as_deref()]
                    autofocus[autofocus]
                    class=(FORM_TEXT_INPUT_STYLE);
            }
        }
    }
}

pub fn kind_radio_group(selected: TransactionKind) -> Markup {
    let radio = |kind: TransactionKind, label: &str| {
        let id = format!("kind-{kind}");

        html! {
            div class="flex items-center gap-3"
            {
                input
                    name="kind"
                    id=(id)
                    type="radio"
                    value=(kind.as_str())
                    checked[kind == selected]
                    required
                    tabindex="0"
                    class=(FORM_RADIO_INPUT_STYLE);

                label for=(id) class=(FORM_RADIO_LABEL_STYLE) { (label) }
            }
        }
    };

    html! {
        fieldset class="space-y-2"
        {
            legend class=(FORM_LABEL_STYLE) { "Type" }

            div class=(FORM_RADIO_GROUP_STYLE)
            {
                (radio(TransactionKind::Expense, "Expense"))
                (radio(TransactionKind::Income, "Income"))
            }
        }
    }
}

pub fn category_select(options: &CategoryOptions, selected: Option<&str>) -> Markup {
    let group = |label: &str, categories: &[Category]| {
        html! {
            @if !categories.is_empty() {
                optgroup label=(label)
                {
                    @for category in categories {
                        option
                            value=(category.name)
                            selected[Some(category.name.as_ref()) == selected]
                        {
                            (category.name)
                        }
                    }
                }
            }
        }
    };

    html! {
        div
        {
            label for="category" class=(FORM_LABEL_STYLE) { "Category" }

            select name="category" id="category" required class=(FORM_TEXT_INPUT_STYLE)
            {
                option value="" disabled selected[selected.is_none()] { "Select a category" }

                (group("Expense", &options.expense))
                (group("Income", &options.income))
            }
        }
    }
}

pub fn notes_input(value: Option<&str>) -> Markup {
    html! {
        div
        {
            label for="notes" class=(FORM_LABEL_STYLE) { "Notes" }

            textarea
                name="notes"
                id="notes"
                rows="2"
                placeholder="Optional"
                class=(FORM_TEXT_INPUT_STYLE)
            {
                (value.unwrap_or_default())
            }
        }
    }
}

/// A select for the frequency.
///
/// If `allow_one_off` is true, the first option is an empty value that
/// means the transaction does not repeat.
pub fn frequency_select(selected: Option<Frequency>, allow_one_off: bool) -> Markup {
    html! {
        div
        {
            label for="frequency" class=(FORM_LABEL_STYLE) { "Repeats" }

            select
                name="frequency"
                id="frequency"
                required[!allow_one_off]
                class=(FORM_TEXT_INPUT_STYLE)
            {
                @if allow_one_off {
                    option value="" selected[selected.is_none()] { "Does not repeat" }
                }

                @for frequency in Frequency::CHOICES {
                    option value=(frequency.as_str()) selected[selected == Some(frequency)]
                    {
                        (frequency)
                    }
                }
            }
        }
    }
}

pub fn end_date_input(value: Option<Date>) -> Markup {
    html! {
        div
        {
            label for="end_date" class=(FORM_LABEL_STYLE) { "End date" }

            input
                name="end_date"
                id="end_date"
                type="date"
                value=[value]
                class=(FORM_TEXT_INPUT_STYLE);

            p class="mt-1 text-xs text-gray-500 dark:text-gray-400"
            {
                "Leave empty to repeat forever. Ignored for one-off transactions."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use crate::{
        category::{Category, CategoryName},
        recurring::Frequency,
        transaction::TransactionKind,
    };

    use super::{CategoryOptions, category_select, frequency_select, kind_radio_group};

    fn render(markup: maud::Markup) -> Html {
        let markup = maud::html! { form { (markup) } };
        Html::parse_document(&markup.into_string())
    }

    fn selected_values(document: &Html, selector: &str) -> Vec<String> {
        document
            .select(&Selector::parse(selector).unwrap())
            .filter(|element| {
                element.value().attr("checked").is_some()
                    || element.value().attr("selected").is_some()
            })
            .filter_map(|element| element.value().attr("value").map(str::to_owned))
            .collect()
    }

    #[test]
    fn kind_radio_checks_selected_kind() {
        for (kind, expected) in [
            (TransactionKind::Expense, "EXPENSE"),
            (TransactionKind::Income, "INCOME"),
        ] {
            let document = render(kind_radio_group(kind));

            assert_eq!(
                selected_values(&document, "input[type=radio][name=kind]"),
                vec![expected]
            );
        }
    }

    #[test]
    fn category_select_groups_by_kind_and_selects_current() {
        let options = CategoryOptions {
            income: vec![Category {
                id: 1,
                name: CategoryName::new_unchecked("Salary"),
                kind: TransactionKind::Income,
            }],
            expense: vec![Category {
                id: 2,
                name: CategoryName::new_unchecked("Housing"),
                kind: TransactionKind::Expense,
            }],
        };

        let document = render(category_select(&options, Some("Housing")));

        let groups: Vec<&str> = document
            .select(&Selector::parse("optgroup").unwrap())
            .filter_map(|group| group.value().attr("label"))
            .collect();
        assert_eq!(groups, vec!["Expense", "Income"]);
        assert_eq!(selected_values(&document, "option"), vec!["Housing"]);
    }

    #[test]
    fn category_select_skips_empty_groups() {
        let document = render(category_select(&CategoryOptions::default(), None));

        assert_eq!(
            document.select(&Selector::parse("optgroup").unwrap()).count(),
            0
        );
    }

    #[test]
    fn frequency_select_offers_one_off_when_allowed() {
        let document = render(frequency_select(None, true));

        let values: Vec<&str> = document
            .select(&Selector::parse("option").unwrap())
            .filter_map(|option| option.value().attr("value"))
            .collect();
        assert_eq!(
            values,
            vec!["", "DAILY", "WEEKLY", "BIWEEKLY", "MONTHLY", "YEARLY"]
        );
        assert_eq!(selected_values(&document, "option"), vec![""]);
    }

    #[test]
    fn frequency_select_without_one_off_selects_current() {
        let document = render(frequency_select(Some(Frequency::Monthly), false));

        assert_eq!(selected_values(&document, "option"), vec!["MONTHLY"]);
        assert_eq!(
            document.select(&Selector::parse("option").unwrap()).count(),
            5
        );
    }
}
