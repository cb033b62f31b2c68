//! Administrator catalog-editing conversation.
//!
//! The conversation is a tagged-union state machine: one state value per
//! admin session, one transition function over typed inputs. Every catalog
//! mutation goes through [`crate::stores::CatalogStore`], which validates
//! before touching anything.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::Product;
use crate::stores::{CatalogStore, ProductField};

/// Which product attribute an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditField {
    Name,
    Price,
    Fields,
    Discount,
}

/// What a pending name prompt will create.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTarget {
    Category,
    Product { category: String },
}

/// What a pending delete confirmation will remove.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DeleteTarget {
    Category { name: String },
    Product { category: String, index: usize },
}

/// Current step of an admin session.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AdminFlowState {
    SelectingCategory,
    SelectingProduct {
        category: String,
        selected: Option<usize>,
    },
    AwaitingName {
        target: NameTarget,
    },
    AwaitingPrice {
        category: String,
        name: String,
    },
    AwaitingFieldsOrType {
        category: String,
        name: String,
        price: Decimal,
    },
    ConfirmingDelete {
        target: DeleteTarget,
    },
    AwaitingEditValue {
        category: String,
        index: usize,
        field: EditField,
    },
}

/// Typed conversation input. Button presses arrive as the structured
/// variants; free text arrives as `Text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum AdminInput {
    SelectCategory(String),
    AddCategory,
    DeleteCategory,
    SelectProduct(usize),
    AddProduct,
    EditField(EditField),
    DeleteProduct,
    Confirm,
    Back,
    Text(String),
}

/// What the flow wants said to the admin after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStep {
    /// Conversation continues; show this prompt.
    Prompt(String),
    /// A mutation completed; show this confirmation. The flow stays open.
    Completed(String),
}

/// One admin session's catalog-editing conversation.
#[derive(Debug)]
pub struct AdminFlow {
    state: AdminFlowState,
}

impl Default for AdminFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminFlow {
    pub fn new() -> Self {
        Self {
            state: AdminFlowState::SelectingCategory,
        }
    }

    /// The prompt for the current state, used when (re)entering the flow.
    pub fn prompt(&self, catalog: &CatalogStore) -> String {
        match &self.state {
            AdminFlowState::SelectingCategory => format!(
                "🛠️ *Gerenciamento de Produtos*\n\nCategorias: {}\n\nSelecione uma categoria, ou adicione uma nova.",
                catalog.list_categories().join(", ")
            ),
            AdminFlowState::SelectingProduct { category, .. } => {
                let products = catalog
                    .get_category(category)
                    .unwrap_or_default()
                    .iter()
                    .enumerate()
                    .map(|(i, p)| format!("{}. {} - R${:.2}", i + 1, p.name, p.unit_price))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("🛠️ *{category}*\n\n{products}\n\nSelecione um produto para editar ou excluir.")
            }
            AdminFlowState::AwaitingName { target: NameTarget::Category } => {
                "➕ Envie o nome da nova categoria:".to_string()
            }
            AdminFlowState::AwaitingName { target: NameTarget::Product { .. } } => {
                "➕ Envie o nome do novo produto:".to_string()
            }
            AdminFlowState::AwaitingPrice { name, .. } => {
                format!("Envie o preço de *{name}* (ex: 65,00):")
            }
            AdminFlowState::AwaitingFieldsOrType { name, .. } => format!(
                "Envie os campos obrigatórios de *{name}* separados por vírgula (ex: MAC, CHAVE OTP),\n\"desconto\" para produto de créditos com desconto, ou \"nenhum\":"
            ),
            AdminFlowState::ConfirmingDelete { target } => match target {
                DeleteTarget::Category { name } => {
                    format!("⚠️ Confirma a exclusão da categoria *{name}* e todos os seus produtos?")
                }
                DeleteTarget::Product { .. } => "⚠️ Confirma a exclusão do produto?".to_string(),
            },
            AdminFlowState::AwaitingEditValue { field, .. } => match field {
                EditField::Name => "Envie o novo nome:".to_string(),
                EditField::Price => "Envie o novo preço (ex: 65,00):".to_string(),
                EditField::Fields => {
                    "Envie os novos campos obrigatórios separados por vírgula:".to_string()
                }
                EditField::Discount => {
                    "O produto participa do desconto de créditos? (sim/não)".to_string()
                }
            },
        }
    }

    /// Advances the conversation. Invalid input for the current state keeps
    /// the state and re-prompts; catalog errors surface as their user
    /// message.
    pub fn advance(&mut self, input: AdminInput, catalog: &CatalogStore) -> FlowStep {
        match (self.state.clone(), input) {
            (AdminFlowState::SelectingCategory, AdminInput::SelectCategory(name)) => {
                if catalog.get_category(&name).is_some() {
                    self.state = AdminFlowState::SelectingProduct {
                        category: name,
                        selected: None,
                    };
                    FlowStep::Prompt(self.prompt(catalog))
                } else {
                    FlowStep::Prompt(format!("❌ Categoria \"{name}\" não existe."))
                }
            }
            (AdminFlowState::SelectingCategory, AdminInput::AddCategory) => {
                self.state = AdminFlowState::AwaitingName {
                    target: NameTarget::Category,
                };
                FlowStep::Prompt(self.prompt(catalog))
            }

            (AdminFlowState::SelectingProduct { category, .. }, AdminInput::SelectProduct(i)) => {
                if catalog.get_product(&category, i).is_some() {
                    self.state = AdminFlowState::SelectingProduct {
                        category,
                        selected: Some(i),
                    };
                    FlowStep::Prompt(
                        "Produto selecionado. Edite nome, preço, campos, desconto, ou exclua."
                            .to_string(),
                    )
                } else {
                    self.state = AdminFlowState::SelectingProduct {
                        category,
                        selected: None,
                    };
                    FlowStep::Prompt("❌ Produto não encontrado.".to_string())
                }
            }
            (AdminFlowState::SelectingProduct { category, .. }, AdminInput::AddProduct) => {
                self.state = AdminFlowState::AwaitingName {
                    target: NameTarget::Product { category },
                };
                FlowStep::Prompt(self.prompt(catalog))
            }
            (
                AdminFlowState::SelectingProduct {
                    category,
                    selected: Some(index),
                },
                AdminInput::EditField(field),
            ) => {
                self.state = AdminFlowState::AwaitingEditValue {
                    category,
                    index,
                    field,
                };
                FlowStep::Prompt(self.prompt(catalog))
            }
            (
                AdminFlowState::SelectingProduct {
                    category,
                    selected: Some(index),
                },
                AdminInput::DeleteProduct,
            ) => {
                self.state = AdminFlowState::ConfirmingDelete {
                    target: DeleteTarget::Product { category, index },
                };
                FlowStep::Prompt(self.prompt(catalog))
            }
            (AdminFlowState::SelectingProduct { category, .. }, AdminInput::DeleteCategory) => {
                self.state = AdminFlowState::ConfirmingDelete {
                    target: DeleteTarget::Category { name: category },
                };
                FlowStep::Prompt(self.prompt(catalog))
            }
            (AdminFlowState::SelectingProduct { .. }, AdminInput::Back) => {
                self.state = AdminFlowState::SelectingCategory;
                FlowStep::Prompt(self.prompt(catalog))
            }

            (
                AdminFlowState::AwaitingName {
                    target: NameTarget::Category,
                },
                AdminInput::Text(name),
            ) => match catalog.add_category(&name) {
                Ok(()) => {
                    self.state = AdminFlowState::SelectingCategory;
                    FlowStep::Completed(format!("✅ Categoria \"{}\" criada.", name.trim()))
                }
                Err(e) => FlowStep::Prompt(e.user_message()),
            },
            (
                AdminFlowState::AwaitingName {
                    target: NameTarget::Product { category },
                },
                AdminInput::Text(name),
            ) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    FlowStep::Prompt("❌ O nome não pode ser vazio. Envie o nome:".to_string())
                } else {
                    self.state = AdminFlowState::AwaitingPrice { category, name };
                    FlowStep::Prompt(self.prompt(catalog))
                }
            }

            (AdminFlowState::AwaitingPrice { category, name }, AdminInput::Text(text)) => {
                match parse_price(&text) {
                    Some(price) if price > Decimal::ZERO => {
                        self.state = AdminFlowState::AwaitingFieldsOrType {
                            category,
                            name,
                            price,
                        };
                        FlowStep::Prompt(self.prompt(catalog))
                    }
                    _ => FlowStep::Prompt(
                        "❌ Preço inválido. Envie um valor maior que zero (ex: 65,00):".to_string(),
                    ),
                }
            }

            (
                AdminFlowState::AwaitingFieldsOrType {
                    category,
                    name,
                    price,
                },
                AdminInput::Text(text),
            ) => {
                let product = build_product(&name, price, &text);
                match catalog.add_product(&category, product) {
                    Ok(()) => {
                        self.state = AdminFlowState::SelectingProduct {
                            category,
                            selected: None,
                        };
                        FlowStep::Completed(format!("✅ Produto \"{name}\" adicionado."))
                    }
                    Err(e) => FlowStep::Prompt(e.user_message()),
                }
            }

            (AdminFlowState::ConfirmingDelete { target }, AdminInput::Confirm) => match target {
                DeleteTarget::Category { name } => match catalog.delete_category(&name) {
                    Ok(()) => {
                        self.state = AdminFlowState::SelectingCategory;
                        FlowStep::Completed(format!("✅ Categoria \"{name}\" excluída."))
                    }
                    Err(e) => {
                        self.state = AdminFlowState::SelectingCategory;
                        FlowStep::Prompt(e.user_message())
                    }
                },
                DeleteTarget::Product { category, index } => {
                    match catalog.delete_product(&category, index) {
                        Ok(removed) => {
                            self.state = AdminFlowState::SelectingProduct {
                                category,
                                selected: None,
                            };
                            FlowStep::Completed(format!("✅ Produto \"{}\" excluído.", removed.name))
                        }
                        Err(e) => {
                            self.state = AdminFlowState::SelectingProduct {
                                category,
                                selected: None,
                            };
                            FlowStep::Prompt(e.user_message())
                        }
                    }
                }
            },
            (AdminFlowState::ConfirmingDelete { target }, AdminInput::Back) => {
                self.state = match target {
                    DeleteTarget::Category { .. } => AdminFlowState::SelectingCategory,
                    DeleteTarget::Product { category, .. } => AdminFlowState::SelectingProduct {
                        category,
                        selected: None,
                    },
                };
                FlowStep::Prompt("Exclusão cancelada.".to_string())
            }

            (
                AdminFlowState::AwaitingEditValue {
                    category,
                    index,
                    field,
                },
                AdminInput::Text(text),
            ) => {
                let parsed = match field {
                    EditField::Name => Some(ProductField::Name(text.trim().to_string())),
                    EditField::Price => parse_price(&text).map(ProductField::Price),
                    EditField::Fields => Some(ProductField::RequiredFields(parse_fields(&text))),
                    EditField::Discount => match text.trim().to_lowercase().as_str() {
                        "sim" | "s" => Some(ProductField::DiscountEligible(true)),
                        "não" | "nao" | "n" => Some(ProductField::DiscountEligible(false)),
                        _ => None,
                    },
                };
                let Some(parsed) = parsed else {
                    return FlowStep::Prompt("❌ Valor inválido. Tente novamente:".to_string());
                };
                match catalog.update_product_field(&category, index, parsed) {
                    Ok(updated) => {
                        self.state = AdminFlowState::SelectingProduct {
                            category,
                            selected: Some(index),
                        };
                        FlowStep::Completed(format!("✅ Produto \"{}\" atualizado.", updated.name))
                    }
                    Err(e) => FlowStep::Prompt(e.user_message()),
                }
            }

            // Back from any prompt-like state returns to category selection.
            (_, AdminInput::Back) => {
                self.state = AdminFlowState::SelectingCategory;
                FlowStep::Prompt(self.prompt(catalog))
            }

            // Anything else re-prompts the current state.
            _ => FlowStep::Prompt(self.prompt(catalog)),
        }
    }
}

fn parse_price(text: &str) -> Option<Decimal> {
    Decimal::from_str(text.trim().replace(',', ".").as_str()).ok()
}

fn parse_fields(text: &str) -> Vec<String> {
    text.split(',')
        .map(|field| field.trim().to_string())
        .filter(|field| !field.is_empty())
        .collect()
}

fn build_product(name: &str, price: Decimal, fields_or_type: &str) -> Product {
    let text = fields_or_type.trim().to_lowercase();
    if text == "nenhum" || text == "-" {
        Product::new(name, price)
    } else if text == "desconto" {
        Product::new(name, price).with_discount()
    } else {
        let fields = parse_fields(fields_or_type);
        if fields.is_empty() {
            Product::new(name, price)
        } else {
            Product::new(name, price).with_fields(fields)
        }
    }
}
