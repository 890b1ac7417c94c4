use sqlx::{PgConnection, PgPool};

use crate::models::{
    ExistingClient, ExistingInvoice, InvoiceExportRecord, ItemExportRecord, PendingClient,
    PendingInvoice, PendingLineItem, TaxTotals,
};

/// Read snapshot of stored invoices for the duplicate check.
pub async fn list_existing_invoices(
    pool: &PgPool,
    owner_id: i64,
) -> Result<Vec<ExistingInvoice>, sqlx::Error> {
    sqlx::query_as::<_, ExistingInvoice>(
        r#"
        SELECT id, invoice_number, invoice_date
        FROM invoices
        WHERE owner_id = $1
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

/// Read snapshot of stored clients for identity matching.
pub async fn list_existing_clients(
    pool: &PgPool,
    owner_id: i64,
) -> Result<Vec<ExistingClient>, sqlx::Error> {
    sqlx::query_as::<_, ExistingClient>(
        r#"
        SELECT id, display_name, email, gstin, tds_deducting
        FROM clients
        WHERE owner_id = $1
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

/// Insert one new client, linked to its owner.
pub async fn insert_client(
    conn: &mut PgConnection,
    owner_id: i64,
    client: &PendingClient,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO clients (
            owner_id, display_name, company_name, email, gstin, pan, tan,
            phone, work_phone, mobile, address, customer_type, currency,
            payment_terms, custom_term_days, tds_deducting
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING id
        "#,
    )
    .bind(owner_id)
    .bind(&client.display_name)
    .bind(&client.company_name)
    .bind(&client.email)
    .bind(&client.gstin)
    .bind(&client.pan)
    .bind(&client.tan)
    .bind(&client.phone)
    .bind(&client.work_phone)
    .bind(&client.mobile)
    .bind(&client.address)
    .bind(&client.customer_type)
    .bind(&client.currency)
    .bind(&client.payment_terms)
    .bind(client.custom_term_days)
    .bind(client.tds_deducting)
    .fetch_one(conn)
    .await
}

/// Refresh a matched client from a re-imported row.
pub async fn update_client(
    conn: &mut PgConnection,
    client_id: i64,
    client: &PendingClient,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE clients
        SET display_name = $2,
            company_name = COALESCE($3, company_name),
            email = COALESCE($4, email),
            gstin = COALESCE($5, gstin),
            pan = COALESCE($6, pan),
            tan = COALESCE($7, tan),
            phone = COALESCE($8, phone),
            work_phone = COALESCE($9, work_phone),
            mobile = COALESCE($10, mobile),
            address = COALESCE($11, address),
            currency = COALESCE($12, currency),
            payment_terms = COALESCE($13, payment_terms),
            custom_term_days = COALESCE($14, custom_term_days),
            tds_deducting = tds_deducting OR $15
        WHERE id = $1
        "#,
    )
    .bind(client_id)
    .bind(&client.display_name)
    .bind(&client.company_name)
    .bind(&client.email)
    .bind(&client.gstin)
    .bind(&client.pan)
    .bind(&client.tan)
    .bind(&client.phone)
    .bind(&client.work_phone)
    .bind(&client.mobile)
    .bind(&client.address)
    .bind(&client.currency)
    .bind(&client.payment_terms)
    .bind(client.custom_term_days)
    .bind(client.tds_deducting)
    .execute(conn)
    .await?;
    Ok(())
}

/// Set the TDS flag on a matched existing client.
pub async fn set_client_tds(conn: &mut PgConnection, client_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE clients SET tds_deducting = TRUE WHERE id = $1")
        .bind(client_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Insert one invoice with its recomputed tax amounts and totals.
pub async fn insert_invoice(
    conn: &mut PgConnection,
    owner_id: i64,
    client_id: i64,
    invoice: &PendingInvoice,
    totals: &TaxTotals,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO invoices (
            owner_id, client_id, invoice_number, invoice_date, due_date,
            order_number, subject, status, notes, terms,
            tax_type, cgst_rate, sgst_rate, igst_rate,
            cgst, sgst, igst, tds, tds_amount, subtotal, total
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
        RETURNING id
        "#,
    )
    .bind(owner_id)
    .bind(client_id)
    .bind(&invoice.invoice_number)
    .bind(&invoice.invoice_date)
    .bind(&invoice.due_date)
    .bind(&invoice.order_number)
    .bind(&invoice.subject)
    .bind(&invoice.status)
    .bind(&invoice.notes)
    .bind(&invoice.terms)
    .bind(invoice.tax.tax_type.as_str())
    .bind(&invoice.tax.cgst_rate)
    .bind(&invoice.tax.sgst_rate)
    .bind(&invoice.tax.igst_rate)
    .bind(&totals.cgst)
    .bind(&totals.sgst)
    .bind(&totals.igst)
    .bind(invoice.tds)
    .bind(&invoice.tds_amount)
    .bind(&invoice.subtotal)
    .bind(&totals.total)
    .fetch_one(conn)
    .await
}

/// Batch-insert line items for one invoice.
pub async fn insert_line_items(
    conn: &mut PgConnection,
    invoice_id: i64,
    items: &[PendingLineItem],
) -> Result<(), sqlx::Error> {
    if items.is_empty() {
        return Ok(());
    }

    let mut query_builder = sqlx::QueryBuilder::new(
        "INSERT INTO invoice_items (invoice_id, description, sac_code, quantity, rate, amount) ",
    );
    query_builder.push_values(items, |mut b, item| {
        b.push_bind(invoice_id)
            .push_bind(&item.description)
            .push_bind(&item.sac_code)
            .push_bind(item.quantity.clone())
            .push_bind(item.rate.clone())
            .push_bind(item.amount.clone());
    });
    query_builder.build().execute(conn).await?;
    Ok(())
}

/// Invoices joined to their client, in import order, for CSV export.
pub async fn list_invoices_for_export(
    pool: &PgPool,
    owner_id: i64,
) -> Result<Vec<InvoiceExportRecord>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceExportRecord>(
        r#"
        SELECT i.id, i.invoice_number, i.invoice_date, i.due_date,
               i.order_number, i.subject, i.status, i.notes, i.terms,
               i.tax_type, i.tds, i.tds_amount,
               i.cgst_rate, i.sgst_rate, i.igst_rate,
               c.display_name AS customer_name,
               c.email AS customer_email,
               c.gstin AS customer_gstin,
               c.pan AS customer_pan,
               c.phone AS customer_phone,
               c.address AS customer_address,
               c.customer_type
        FROM invoices i
        INNER JOIN clients c ON c.id = i.client_id
        WHERE i.owner_id = $1
        ORDER BY i.id
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

/// Line items for the given invoices, in insertion order.
pub async fn list_items_for_export(
    pool: &PgPool,
    invoice_ids: &[i64],
) -> Result<Vec<ItemExportRecord>, sqlx::Error> {
    sqlx::query_as::<_, ItemExportRecord>(
        r#"
        SELECT invoice_id, description, sac_code, quantity, rate
        FROM invoice_items
        WHERE invoice_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(invoice_ids)
    .fetch_all(pool)
    .await
}
