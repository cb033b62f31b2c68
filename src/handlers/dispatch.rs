use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::format::{format_cart_message, format_order_details, status_label, status_marker};
use crate::models::{CartLineItem, Order, UserId};
use crate::services::{
    AdminFlow, AdminInput, CheckoutService, OrderService, PricingPolicy, ReconcileOutcome,
    SessionProfile,
};
use crate::stores::{CartStore, CatalogStore, UserRegistry};

use super::{Intent, Reply};

const MIN_NAME_LEN: usize = 3;

/// Which step of the registration conversation a user is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegistrationStep {
    AwaitingName,
    AwaitingPhone,
}

/// Per-conversation state the delivery layer cannot hold for us.
#[derive(Default)]
struct Session {
    registration: Option<RegistrationStep>,
    profile: SessionProfile,
    admin_flow: Option<AdminFlow>,
}

/// Turns inbound intents into replies. Every error is resolved here into a
/// specific user-facing message; nothing propagates past this boundary.
pub struct Dispatcher {
    catalog: Arc<CatalogStore>,
    carts: Arc<CartStore>,
    users: Arc<UserRegistry>,
    checkout: Arc<CheckoutService>,
    orders: Arc<OrderService>,
    pricing: PricingPolicy,
    events: EventSender,
    admin_chat_id: UserId,
    sessions: DashMap<UserId, Session>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<CatalogStore>,
        carts: Arc<CartStore>,
        users: Arc<UserRegistry>,
        checkout: Arc<CheckoutService>,
        orders: Arc<OrderService>,
        pricing: PricingPolicy,
        events: EventSender,
        admin_chat_id: UserId,
    ) -> Self {
        Self {
            catalog,
            carts,
            users,
            checkout,
            orders,
            pricing,
            events,
            admin_chat_id,
            sessions: DashMap::new(),
        }
    }

    fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_chat_id != 0 && user_id == self.admin_chat_id
    }

    #[instrument(skip(self, intent), fields(user_id = intent.user_id()))]
    pub async fn handle(&self, intent: Intent) -> Reply {
        match intent {
            Intent::Start { user_id } => self.handle_start(user_id),
            Intent::Text { user_id, text } => self.handle_text(user_id, text),
            Intent::ListCategories { .. } => self.handle_list_categories(),
            Intent::ListProducts { category, .. } => self.handle_list_products(&category),
            Intent::AddToCart {
                user_id,
                category,
                product_index,
                quantity,
                fields,
            } => {
                self.handle_add_to_cart(user_id, &category, product_index, quantity, fields)
                    .await
            }
            Intent::ViewCart { user_id } => self.handle_view_cart(user_id),
            Intent::ClearCart { user_id } => self.handle_clear_cart(user_id).await,
            Intent::Checkout { user_id } => self.handle_checkout(user_id).await,
            Intent::CheckPayment { user_id, order_id } => {
                self.handle_check_payment(user_id, &order_id).await
            }
            Intent::ListOrders { user_id } => self.handle_list_orders(user_id),
            Intent::OrderDetails { user_id, order_id } => {
                self.handle_order_details(user_id, &order_id)
            }
            Intent::AdminOrders { user_id } => self.admin_only(user_id, Self::handle_admin_orders),
            Intent::MarkDelivered { user_id, order_id } => {
                if !self.is_admin(user_id) {
                    return permission_denied();
                }
                self.handle_mark_delivered(&order_id).await
            }
            Intent::CancelOrder { user_id, order_id } => {
                if !self.is_admin(user_id) {
                    return permission_denied();
                }
                self.handle_cancel_order(&order_id).await
            }
            Intent::AdminCatalog { user_id } => {
                if !self.is_admin(user_id) {
                    return permission_denied();
                }
                self.handle_admin_catalog(user_id)
            }
            Intent::Admin { user_id, input } => {
                if !self.is_admin(user_id) {
                    return permission_denied();
                }
                self.handle_admin_input(user_id, input)
            }
        }
    }

    fn admin_only(&self, user_id: UserId, handler: fn(&Self) -> Reply) -> Reply {
        if !self.is_admin(user_id) {
            return permission_denied();
        }
        handler(self)
    }

    // ---- registration ----

    fn handle_start(&self, user_id: UserId) -> Reply {
        if let Some(user) = self.users.get(user_id) {
            return Reply::with_choices(
                format!("Olá, {}! O que você gostaria de fazer hoje?", user.name),
                main_menu(),
            );
        }

        let mut session = self.sessions.entry(user_id).or_default();
        // An interrupted registration may have left usable data in the
        // session; finish it rather than asking everything again.
        if let (Some(name), Some(phone)) = (
            session.profile.name.clone(),
            session.profile.phone.clone(),
        ) {
            drop(session);
            let user = self.users.register(user_id, &name, &phone);
            info!(%user_id, "user registered from session data on /start");
            return Reply::with_choices(
                format!("Bem-vindo de volta, {}! Você já está registrado.", user.name),
                main_menu(),
            );
        }

        session.registration = Some(RegistrationStep::AwaitingName);
        Reply::text(
            "👋 *Bem-vindo à nossa loja!*\n\nPara começar, precisamos de algumas informações básicas.\n\nPor favor, digite seu nome completo:",
        )
    }

    fn handle_text(&self, user_id: UserId, text: String) -> Reply {
        // Admin catalog conversation takes free text while active.
        if self.is_admin(user_id) {
            if let Some(mut session) = self.sessions.get_mut(&user_id) {
                if session.admin_flow.is_some() {
                    return self.advance_admin_flow(&mut session, AdminInput::Text(text));
                }
            }
        }

        let Some(mut session) = self.sessions.get_mut(&user_id) else {
            return help_reply();
        };
        match session.registration {
            Some(RegistrationStep::AwaitingName) => {
                let name = text.trim().to_string();
                if name.chars().count() < MIN_NAME_LEN {
                    return Reply::text(
                        "Por favor, digite seu nome completo válido (mínimo 3 caracteres):",
                    );
                }
                session.profile.name = Some(name);
                session.registration = Some(RegistrationStep::AwaitingPhone);
                Reply::text(
                    "Agora, por favor, envie seu número de telefone com DDD (ex: 11999999999):",
                )
            }
            Some(RegistrationStep::AwaitingPhone) => {
                let phone: String = text.chars().filter(char::is_ascii_digit).collect();
                if phone.len() < 10 || phone.len() > 11 {
                    return Reply::text(
                        "Formato de telefone inválido. Por favor, envie apenas números com DDD (ex: 11999999999):",
                    );
                }
                let name = session
                    .profile
                    .name
                    .clone()
                    .unwrap_or_else(|| "Cliente".to_string());
                session.profile.phone = Some(phone.clone());
                session.registration = None;
                drop(session);

                let user = self.users.register(user_id, &name, &phone);
                Reply::with_choices(
                    format!(
                        "✅ *Registro concluído com sucesso!*\n\nObrigado, {}. Agora você pode navegar pelos nossos produtos e fazer pedidos.",
                        user.name
                    ),
                    main_menu(),
                )
            }
            None => help_reply(),
        }
    }

    // ---- browsing and cart ----

    fn handle_list_categories(&self) -> Reply {
        Reply::with_choices(
            "🛍️ Escolha uma categoria:",
            self.catalog.list_categories(),
        )
    }

    fn handle_list_products(&self, category: &str) -> Reply {
        match self.catalog.get_category(category) {
            Some(products) => Reply::with_choices(
                format!("🛍️ *{category}*\n\nEscolha um produto:"),
                products
                    .iter()
                    .map(|p| format!("{} - R${:.2}", p.name, p.unit_price))
                    .collect(),
            ),
            None => Reply::text(ServiceError::NotFound(format!("categoria {category}")).user_message()),
        }
    }

    async fn handle_add_to_cart(
        &self,
        user_id: UserId,
        category: &str,
        product_index: usize,
        quantity: Option<u32>,
        fields: std::collections::BTreeMap<String, String>,
    ) -> Reply {
        let Some(product) = self.catalog.get_product(category, product_index) else {
            return Reply::text(
                "❌ Erro: Produto não encontrado. Por favor, navegue novamente pelo catálogo.",
            );
        };

        let item = match quantity {
            Some(quantity) if quantity > 0 => self.pricing.credit_line_item(&product, quantity),
            Some(_) => return Reply::text("❌ Quantidade inválida."),
            None => CartLineItem::new(product.name.clone(), product.unit_price)
                .with_details(fields),
        };

        let item_name = item.name.clone();
        self.carts.add_item(user_id, item);
        self.events
            .send_or_log(Event::CartItemAdded {
                user_id,
                item_name: item_name.clone(),
            })
            .await;

        Reply::with_choices(
            format!("✅ *{item_name}* foi adicionado ao seu carrinho!\n\nO que você gostaria de fazer agora?"),
            vec![
                "🛒 Ver Carrinho".to_string(),
                "🛍️ Continuar Comprando".to_string(),
            ],
        )
    }

    fn handle_view_cart(&self, user_id: UserId) -> Reply {
        let items = self.carts.get_cart(user_id);
        if items.is_empty() {
            return Reply::with_choices(
                "🛒 Seu carrinho está vazio.\n\nUse o botão '🛍️ Produtos' para navegar e adicionar produtos.",
                main_menu(),
            );
        }
        Reply::with_choices(
            format_cart_message(&items),
            vec![
                "💰 Finalizar Compra".to_string(),
                "🗑️ Limpar Carrinho".to_string(),
                "🛍️ Continuar Comprando".to_string(),
            ],
        )
    }

    async fn handle_clear_cart(&self, user_id: UserId) -> Reply {
        self.carts.clear(user_id);
        self.events.send_or_log(Event::CartCleared(user_id)).await;
        Reply::text(
            "🗑️ Seu carrinho foi esvaziado com sucesso!\n\nUse o botão '🛍️ Produtos' para navegar e adicionar produtos.",
        )
    }

    // ---- checkout and payment ----

    async fn handle_checkout(&self, user_id: UserId) -> Reply {
        let profile = self
            .sessions
            .get(&user_id)
            .map(|session| session.profile.clone())
            .unwrap_or_default();

        match self.checkout.submit_payment(user_id, &profile).await {
            Ok(receipt) => {
                let code = receipt.qr_code.unwrap_or_else(|| receipt.payment_id.clone());
                Reply::with_choices(
                    format!(
                        "🧾 *Resumo do Pedido #{}*\n\n{}\n\n*PAGAMENTO VIA PIX*\nCopie o código abaixo para pagar via PIX:\n\n`{}`\n\nAbra seu aplicativo bancário, escolha a opção PIX > Copia e Cola, e cole o código acima.\n\nApós realizar o pagamento, clique no botão 'Verificar Pagamento' para confirmar.",
                        receipt.order.id,
                        format_cart_message(&receipt.order.items),
                        code,
                    ),
                    vec!["🔍 Verificar Pagamento".to_string()],
                )
            }
            Err(e) => {
                let choices = if e.is_retryable() {
                    vec!["🔄 Tentar Novamente".to_string()]
                } else {
                    Vec::new()
                };
                Reply::with_choices(e.user_message(), choices)
            }
        }
    }

    async fn handle_check_payment(&self, user_id: UserId, order_id: &str) -> Reply {
        let retry = vec!["🔍 Verificar Novamente".to_string()];
        match self.checkout.reconcile_payment(user_id, order_id).await {
            Ok(ReconcileOutcome::Approved { .. }) => Reply::text(
                "✅ *Pagamento Aprovado!*\n\nSeu pagamento foi confirmado e seu pedido está sendo processado.\nVocê receberá uma notificação quando seu pedido for entregue.\n\nObrigado por comprar conosco!",
            ),
            Ok(ReconcileOutcome::Pending) => Reply::with_choices(
                "⏳ *Pagamento Pendente*\n\nSeu pagamento está sendo processado.\nPor favor, verifique novamente em alguns instantes.",
                retry,
            ),
            Ok(ReconcileOutcome::NotIdentified) => Reply::with_choices(
                "💰 *Status do Pagamento*\n\nAinda não identificamos seu pagamento.\nSe você já pagou, aguarde alguns instantes e verifique novamente.",
                retry,
            ),
            Ok(ReconcileOutcome::Rejected) => Reply::text(
                "❌ *Pagamento Rejeitado*\n\nInfelizmente seu pagamento foi rejeitado ou cancelado.\nPor favor, tente novamente ou use outro método de pagamento.",
            ),
            Ok(ReconcileOutcome::Unrecognized(status)) => Reply::with_choices(
                format!(
                    "ℹ️ *Status do Pagamento: {status}*\n\nPor favor, verifique novamente em alguns instantes ou entre em contato com o suporte."
                ),
                retry,
            ),
            Err(e) => {
                let choices = if e.is_retryable() { retry } else { Vec::new() };
                Reply::with_choices(e.user_message(), choices)
            }
        }
    }

    // ---- order history ----

    fn handle_list_orders(&self, user_id: UserId) -> Reply {
        let orders = self.orders.list_for_user(user_id);
        if orders.is_empty() {
            return Reply::with_choices("📋 Você ainda não realizou nenhum pedido.", main_menu());
        }

        let mut text = String::from("📋 *Seus Pedidos:*\n\n");
        let mut choices = Vec::with_capacity(orders.len());
        for order in &orders {
            text.push_str(&format!(
                "{} Pedido #{} - Status: {}\n",
                status_marker(order.status),
                order.id,
                status_label(order.status),
            ));
            choices.push(format!("Ver Pedido #{}", order.id));
        }
        Reply::with_choices(text, choices)
    }

    fn handle_order_details(&self, user_id: UserId, order_id: &str) -> Reply {
        match self.orders.order_details(user_id, order_id) {
            Ok(order) => {
                let mut choices = Vec::new();
                if order.status == crate::models::OrderStatus::Pending {
                    choices.push("🔍 Verificar Pagamento".to_string());
                }
                choices.push("◀️ Voltar aos Pedidos".to_string());
                Reply::with_choices(format_order_details(&order, true), choices)
            }
            Err(e) => Reply::text(e.user_message()),
        }
    }

    // ---- admin ----

    fn handle_admin_orders(&self) -> Reply {
        let open = self.orders.list_open();
        if open.is_empty() {
            return Reply::text("Não há pedidos pendentes no momento.");
        }

        let mut text = String::from("📋 *PEDIDOS EM ABERTO*\n\n");
        let mut choices = Vec::new();
        for order in &open {
            text.push_str(&self.admin_order_block(order));
            text.push_str("\n\n");
            choices.push(format!("✅ Entregar #{}", order.id));
            choices.push(format!("❌ Cancelar #{}", order.id));
        }
        Reply::with_choices(text, choices)
    }

    async fn handle_mark_delivered(&self, order_id: &str) -> Reply {
        match self.orders.mark_delivered(order_id).await {
            Ok(order) => Reply::text(format!(
                "📦 *PEDIDO ENTREGUE* 📦\n\n{}",
                self.admin_order_block(&order)
            )),
            Err(e) => Reply::text(e.user_message()),
        }
    }

    async fn handle_cancel_order(&self, order_id: &str) -> Reply {
        match self.orders.cancel_order(order_id).await {
            Ok(order) => Reply::text(format!(
                "❌ *PEDIDO CANCELADO* ❌\n\n{}",
                self.admin_order_block(&order)
            )),
            Err(e) => Reply::text(e.user_message()),
        }
    }

    fn handle_admin_catalog(&self, user_id: UserId) -> Reply {
        let mut session = self.sessions.entry(user_id).or_default();
        let flow = AdminFlow::new();
        let prompt = flow.prompt(&self.catalog);
        session.admin_flow = Some(flow);
        Reply::text(prompt)
    }

    fn handle_admin_input(&self, user_id: UserId, input: AdminInput) -> Reply {
        let mut session = self.sessions.entry(user_id).or_default();
        if session.admin_flow.is_none() {
            session.admin_flow = Some(AdminFlow::new());
        }
        self.advance_admin_flow(&mut session, input)
    }

    fn advance_admin_flow(&self, session: &mut Session, input: AdminInput) -> Reply {
        let Some(flow) = session.admin_flow.as_mut() else {
            return help_reply();
        };
        match flow.advance(input, &self.catalog) {
            crate::services::FlowStep::Prompt(text) => Reply::text(text),
            crate::services::FlowStep::Completed(text) => Reply::text(text),
        }
    }

    fn admin_order_block(&self, order: &Order) -> String {
        match self.users.get(order.user_id) {
            Some(user) => format!(
                "👤 *Cliente:* {}\n📱 *Telefone:* {}\n\n{}",
                user.name,
                user.phone,
                format_order_details(order, true)
            ),
            None => format_order_details(order, true),
        }
    }
}

fn main_menu() -> Vec<String> {
    vec![
        "🛒 Ver Carrinho".to_string(),
        "🛍️ Produtos".to_string(),
        "📋 Meus Pedidos".to_string(),
        "❓ Ajuda".to_string(),
    ]
}

fn help_reply() -> Reply {
    Reply::with_choices(
        "Use os botões abaixo para navegar pela loja. Se precisar recomeçar, envie /start.",
        main_menu(),
    )
}

fn permission_denied() -> Reply {
    Reply::text("❌ Você não tem permissão para acessar esta área administrativa.")
}
