//! What the bot says.

use starshop_core::{
    format_minor, GatewayAsset, ManualTopup, Outgoing, Pricing, PurchaseOrder, UserId,
};

use super::callbacks::Callback;
use crate::desk::{OpenedInvoice, StatsReport};
use crate::membership::GateDiagnosis;

/// Topup presets, whole rubles.
pub const TOPUP_PRESETS: [i64; 5] = [300, 500, 1000, 2500, 5000];

/// Quantity presets.
pub const QUANTITY_PRESETS: [u32; 5] = [50, 100, 250, 500, 1000];

const BACK: &str = "⬅️ Назад";
const TO_MENU: &str = "⬅️ В главное меню";

fn rub(minor: i64) -> String {
    format!("{} ₽", format_minor(minor))
}

fn with_menu_buttons(message: Outgoing) -> Outgoing {
    message
        .button("💰 Баланс (₽)", Callback::Balance.to_string())
        .button("⭐ Купить звёзды", Callback::BuyMenu.to_string())
}

pub fn welcome(user_id: UserId, pricing: &Pricing) -> Outgoing {
    with_menu_buttons(Outgoing::new(
        user_id,
        format!(
            "Привет! Здесь можно пополнить баланс в рублях и купить ⭐ Telegram Stars.\n\n\
             Текущая цена: {:.2} ₽ за 1 ⭐",
            pricing.unit_price
        ),
    ))
}

pub fn main_menu(user_id: UserId) -> Outgoing {
    with_menu_buttons(Outgoing::new(user_id, "Главное меню:"))
}

pub fn balance(user_id: UserId, balance_minor: i64, gateway_pending: bool) -> Outgoing {
    let mut message = Outgoing::new(user_id, format!("Ваш баланс: {}", rub(balance_minor)));
    for amount in TOPUP_PRESETS {
        message = message.button(
            format!("Пополнить +{amount} ₽"),
            Callback::TopupAmount(amount).to_string(),
        );
    }
    message = message.button("Другая сумма (₽)", Callback::TopupCustom.to_string());
    if gateway_pending {
        message = message.button("Проверить оплату", Callback::CheckCrypto.to_string());
    }
    message.button(BACK, Callback::Menu.to_string())
}

pub fn payment_methods(user_id: UserId, amount_minor: i64, gateway: bool) -> Outgoing {
    let mut message = Outgoing::new(
        user_id,
        format!("Пополнение на {}: выберите способ оплаты:", rub(amount_minor)),
    )
    .button("💳 СБП", Callback::PaySbp.to_string());
    if gateway {
        message = message
            .button("🌐 TONCOIN [CryptoBot]", Callback::PayTon.to_string())
            .button("🌐 USDT [CryptoBot]", Callback::PayUsdt.to_string());
    }
    message.button(BACK, Callback::Balance.to_string())
}

pub fn ask_topup_amount(user_id: UserId, min: i64, max: i64) -> Outgoing {
    Outgoing::new(
        user_id,
        format!(
            "Введите сумму пополнения в рублях (целое число). Минимум {min}, максимум {max}.\n\
             Например: 750"
        ),
    )
}

pub fn topup_out_of_range(user_id: UserId, min: i64, max: i64) -> Outgoing {
    Outgoing::new(
        user_id,
        format!("Сумма вне допустимого диапазона. Введите от {min} до {max} ₽."),
    )
}

pub fn choose_amount_first(user_id: UserId) -> Outgoing {
    Outgoing::new(user_id, "Сначала выберите сумму пополнения.")
        .button("💰 Баланс (₽)", Callback::Balance.to_string())
}

pub fn sbp_instructions(user_id: UserId, amount_minor: i64, instruction: &str) -> Outgoing {
    Outgoing::new(
        user_id,
        format!("Сумма к оплате: {}\n\n{instruction}", rub(amount_minor)),
    )
    .button("Я оплатил", Callback::PaidSbp.to_string())
    .button(BACK, Callback::Balance.to_string())
}

pub fn manual_topup_filed(topup: &ManualTopup) -> Outgoing {
    Outgoing::new(
        topup.user_id,
        format!(
            "Заявка {} на {} отправлена администратору. Баланс пополнится после проверки перевода.",
            topup.code,
            rub(topup.amount_minor)
        ),
    )
    .button(TO_MENU, Callback::Menu.to_string())
}

pub fn invoice(user_id: UserId, invoice: &OpenedInvoice) -> Outgoing {
    Outgoing::new(
        user_id,
        format!(
            "Выставлен счёт в Crypto Bot на {} (актив: {}).",
            rub(invoice.amount_minor),
            invoice.asset
        ),
    )
    .link("Оплатить в Crypto Bot", invoice.url.clone())
    .button("Проверить оплату", Callback::CheckCrypto.to_string())
    .button(BACK, Callback::Balance.to_string())
}

pub fn gateway_credited(user_id: UserId, amount_minor: i64, balance_minor: i64) -> Outgoing {
    Outgoing::new(
        user_id,
        format!(
            "Оплата подтверждена Crypto Bot. Баланс пополнен на {}. Текущий баланс: {}",
            rub(amount_minor),
            rub(balance_minor)
        ),
    )
    .button(TO_MENU, Callback::Menu.to_string())
}

pub fn not_paid_yet(user_id: UserId) -> Outgoing {
    Outgoing::new(
        user_id,
        "Платёж пока не виден как оплаченный. Попробуйте позже.",
    )
    .button("Проверить оплату", Callback::CheckCrypto.to_string())
}

pub fn nothing_to_check(user_id: UserId) -> Outgoing {
    Outgoing::new(user_id, "Нет ожидающих пополнений для проверки.")
}

pub fn gateway_unavailable(user_id: UserId, asset: Option<GatewayAsset>) -> Outgoing {
    let text = match asset {
        Some(asset) => format!("Оплата {asset} сейчас недоступна. Выберите другой способ."),
        None => "Оплата через Crypto Bot сейчас недоступна.".to_string(),
    };
    Outgoing::new(user_id, text).button(BACK, Callback::Balance.to_string())
}

pub fn buy_menu(user_id: UserId, pricing: &Pricing) -> Outgoing {
    let mut message = Outgoing::new(
        user_id,
        format!(
            "Выберите количество звёзд для покупки ({:.2} ₽ за 1 ⭐):",
            pricing.unit_price
        ),
    );
    for quantity in QUANTITY_PRESETS {
        message = message.button(format!("Купить {quantity} ⭐"), Callback::Buy(quantity).to_string());
    }
    message
        .button("Другая сумма", Callback::Custom.to_string())
        .button(BACK, Callback::Menu.to_string())
}

pub fn ask_quantity(user_id: UserId, min: u32, max: u32) -> Outgoing {
    Outgoing::new(
        user_id,
        format!("Введите количество звёзд (от {min} до {max}):"),
    )
}

pub fn insufficient(
    user_id: UserId,
    quantity: u32,
    price_minor: i64,
    shortfall_minor: i64,
) -> Outgoing {
    Outgoing::new(
        user_id,
        format!(
            "Стоимость {quantity} ⭐: {}. Недостаточно средств. Пополните ещё {} через Баланс.",
            rub(price_minor),
            rub(shortfall_minor)
        ),
    )
    .button("💰 Баланс (₽)", Callback::Balance.to_string())
}

pub fn order_filed(order: &PurchaseOrder) -> Outgoing {
    Outgoing::new(
        order.user_id,
        format!(
            "Заказ {} принят: {} ⭐ на {} за {}. Оплата спишется с баланса, когда администратор выполнит заказ.",
            order.code,
            order.quantity,
            order.recipient,
            rub(order.price_minor)
        ),
    )
    .button(TO_MENU, Callback::Menu.to_string())
}

pub fn delivered(
    user_id: UserId,
    quantity: u32,
    recipient: &str,
    price_minor: i64,
    balance_minor: i64,
) -> Outgoing {
    Outgoing::new(
        user_id,
        format!(
            "Готово! Заказ оформлен.\nПополнение: {quantity} ⭐ на {recipient}\nСписано: {}\nТекущий баланс: {}",
            rub(price_minor),
            rub(balance_minor)
        ),
    )
}

pub fn order_payment_link(user_id: UserId, url: &str) -> Outgoing {
    Outgoing::new(
        user_id,
        "Для завершения заказа требуется оплата через CryptoBot (ссылка ниже). \
         После оплаты заказ будет обработан автоматически.",
    )
    .link("Оплатить заказ в CryptoBot", url)
    .button(TO_MENU, Callback::Menu.to_string())
}

pub fn refunded(user_id: UserId, price_minor: i64, balance_minor: i64) -> Outgoing {
    Outgoing::new(
        user_id,
        format!(
            "Не удалось оформить покупку. {} возвращено на баланс. Текущий баланс: {}",
            rub(price_minor),
            rub(balance_minor)
        ),
    )
}

pub fn subscribe_first(user_id: UserId, channel: &str) -> Outgoing {
    let handle = channel.trim_start_matches('@');
    Outgoing::new(
        user_id,
        format!("Чтобы продолжить, подпишитесь на канал {channel} и повторите действие."),
    )
    .link("Подписаться", format!("https://t.me/{handle}"))
    .button(TO_MENU, Callback::Menu.to_string())
}

pub fn try_later(user_id: UserId) -> Outgoing {
    Outgoing::new(user_id, "Сервис временно недоступен. Попробуйте позже.")
}

pub fn unknown_input(user_id: UserId) -> Outgoing {
    main_menu(user_id)
}

pub fn invalid_number(user_id: UserId) -> Outgoing {
    Outgoing::new(user_id, "Введите целое число.")
}

// ============================================================================
// Admin
// ============================================================================

pub fn admin_topup_request(admin: UserId, topup: &ManualTopup, from: &str) -> Outgoing {
    Outgoing::new(
        admin,
        format!(
            "Заявка на пополнение {}\nПользователь: {from} ({})\nСумма: {}\nСпособ: СБП",
            topup.code,
            topup.user_id,
            rub(topup.amount_minor)
        ),
    )
    .button("✅ Зачислить", Callback::TopupOk(topup.code.clone()).to_string())
    .button("✏️ Изменить сумму", Callback::TopupEdit(topup.code.clone()).to_string())
    .button("❌ Отклонить", Callback::TopupNo(topup.code.clone()).to_string())
}

pub fn admin_order_request(admin: UserId, order: &PurchaseOrder, from: &str) -> Outgoing {
    Outgoing::new(
        admin,
        format!(
            "Новый заказ {}\nПользователь: {from} ({})\nПолучатель: {}\nКоличество: {} ⭐\nСумма: {}",
            order.code,
            order.user_id,
            order.recipient,
            order.quantity,
            rub(order.price_minor)
        ),
    )
    .button("✅ Выполнен", Callback::OrderOk(order.code.clone()).to_string())
    .button("❌ Отклонить", Callback::OrderNo(order.code.clone()).to_string())
}

pub fn admin_done(admin: UserId, text: impl Into<String>) -> Outgoing {
    Outgoing::new(admin, text)
}

pub fn already_handled(admin: UserId, code: &impl std::fmt::Display) -> Outgoing {
    Outgoing::new(admin, format!("Заявка {code} не найдена или уже обработана."))
}

pub fn ask_amended_amount(admin: UserId, topup: &ManualTopup) -> Outgoing {
    Outgoing::new(
        admin,
        format!(
            "Заявка {}: заявлено {}. Введите фактически полученную сумму в рублях:",
            topup.code,
            rub(topup.amount_minor)
        ),
    )
}

pub fn topup_amended(admin: UserId, topup: &ManualTopup) -> Outgoing {
    Outgoing::new(
        admin,
        format!("Сумма заявки {} изменена на {}.", topup.code, rub(topup.amount_minor)),
    )
    .button("✅ Зачислить", Callback::TopupOk(topup.code.clone()).to_string())
    .button("❌ Отклонить", Callback::TopupNo(topup.code.clone()).to_string())
}

pub fn user_topup_credited(topup: &ManualTopup, balance_minor: i64) -> Outgoing {
    Outgoing::new(
        topup.user_id,
        format!(
            "Пополнение {} подтверждено: +{}. Текущий баланс: {}",
            topup.code,
            rub(topup.amount_minor),
            rub(balance_minor)
        ),
    )
    .button(TO_MENU, Callback::Menu.to_string())
}

pub fn user_topup_rejected(topup: &ManualTopup) -> Outgoing {
    Outgoing::new(
        topup.user_id,
        format!(
            "Пополнение {} на {} отклонено. Если перевод был, свяжитесь с поддержкой.",
            topup.code,
            rub(topup.amount_minor)
        ),
    )
}

pub fn user_order_done(order: &PurchaseOrder, balance_minor: i64) -> Outgoing {
    delivered(
        order.user_id,
        order.quantity,
        &order.recipient,
        order.price_minor,
        balance_minor,
    )
}

pub fn user_order_rejected(order: &PurchaseOrder) -> Outgoing {
    Outgoing::new(
        order.user_id,
        format!(
            "Заказ {} на {} ⭐ отклонён. Баланс не изменился.",
            order.code, order.quantity
        ),
    )
}

pub fn order_lacks_funds(admin: UserId, order: &PurchaseOrder, shortfall_minor: i64) -> Outgoing {
    Outgoing::new(
        admin,
        format!(
            "Заказ {}: на балансе пользователя не хватает {}. Заказ остаётся в очереди.",
            order.code,
            rub(shortfall_minor)
        ),
    )
}

pub fn pricing_changed(admin: UserId, pricing: &Pricing) -> Outgoing {
    Outgoing::new(
        admin,
        format!(
            "OK. Цена для клиента: {:.2} ₽ за 1 ⭐, себестоимость: {:.2} ₽ за 1 ⭐",
            pricing.unit_price, pricing.unit_cost
        ),
    )
}

pub fn stats(admin: UserId, report: &StatsReport) -> Outgoing {
    Outgoing::new(
        admin,
        format!(
            "Пользователей: {}\nПополнено всего: {}\nПродано звёзд: {}\nОценка маржи: {} \
             (цена {:.2} ₽, себестоимость {:.2} ₽)",
            report.summary.users,
            rub(report.summary.total_deposited_minor),
            report.summary.total_goods_units,
            rub(report.margin_minor),
            report.pricing.unit_price,
            report.pricing.unit_cost
        ),
    )
}

pub fn gate_report(admin: UserId, diagnosis: Option<&GateDiagnosis>) -> Outgoing {
    let text = match diagnosis {
        None => "Проверка подписки выключена.".to_string(),
        Some(GateDiagnosis {
            channel,
            title: Some(title),
            ..
        }) => format!("Канал {channel} найден: «{title}». Проверка подписки работает."),
        Some(GateDiagnosis { channel, error, .. }) => format!(
            "Канал {channel} недоступен боту: {}",
            error.as_deref().unwrap_or("неизвестная ошибка")
        ),
    };
    Outgoing::new(admin, text)
}

pub fn balance_restored(admin: UserId, user_id: UserId, previous: i64, balance_minor: i64) -> Outgoing {
    Outgoing::new(
        admin,
        format!(
            "Баланс {user_id} восстановлен: {} → {}",
            rub(previous),
            rub(balance_minor)
        ),
    )
}

pub fn usage(user_id: UserId, usage: &str) -> Outgoing {
    Outgoing::new(user_id, format!("Использование: {usage}"))
}

pub fn not_allowed(user_id: UserId) -> Outgoing {
    Outgoing::new(user_id, "Команда доступна только администраторам.")
}
