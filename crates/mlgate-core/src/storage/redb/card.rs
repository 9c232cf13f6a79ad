//! Negotiation card <-> row graph.
//!
//! ```text
//! negotiation_card ─┬─ nc_goal_descriptor ── nc_metric_descriptor
//!                   ├─ nc_data_descriptor ─┬─ nc_label_descriptor
//!                   │                      └─ nc_field_descriptor
//!                   ├─ nc_model_resource (development)
//!                   ├─ nc_model_resource (production)
//!                   └─ nc_problem_type (seeded)
//! ```

use super::schema::{
    DataRow, FieldRow, GoalRow, LabelRow, MetricRow, ModelResourceRow, NegotiationCardRow,
    NC_DATA_CLASSIFICATION, NC_DATA_DESCRIPTOR, NC_FIELD_DESCRIPTOR, NC_GOAL_DESCRIPTOR,
    NC_LABEL_DESCRIPTOR, NC_METRIC_DESCRIPTOR, NC_MODEL_RESOURCE, NC_PROBLEM_TYPE,
    NEGOTIATION_CARD,
};
use super::{RowSource, delete_row, delete_where, insert_row, seed_id, seed_name};
use crate::model::{
    DataDescriptor, FieldDescriptor, GoalDescriptor, LabelDescriptor, MetricDescriptor,
    ModelDescriptor, ModelResourcesDescriptor, NegotiationCard, RiskDescriptor, SystemDescriptor,
};
use crate::MlgateError;
use redb::WriteTransaction;

fn resources_row(r: &ModelResourcesDescriptor) -> ModelResourceRow {
    ModelResourceRow {
        cpu: r.cpu.clone(),
        gpu: r.gpu.clone(),
        memory: r.memory.clone(),
        storage: r.storage.clone(),
    }
}

fn resources_model(r: ModelResourceRow) -> ModelResourcesDescriptor {
    ModelResourcesDescriptor {
        cpu: r.cpu,
        gpu: r.gpu,
        memory: r.memory,
        storage: r.storage,
    }
}

/// Write a card's row graph under an artifact header.
pub(crate) fn insert(
    txn: &WriteTransaction,
    header_id: u64,
    card: &NegotiationCard,
) -> Result<u64, MlgateError> {
    let problem_type_id = seed_id(txn, NC_PROBLEM_TYPE, card.system.problem_type.as_str())?;
    let dev_resources_id = insert_row(
        txn,
        NC_MODEL_RESOURCE,
        &resources_row(&card.model.development_compute_resources),
    )?;
    let prod_resources_id = insert_row(
        txn,
        NC_MODEL_RESOURCE,
        &resources_row(&card.model.production_compute_resources),
    )?;

    let card_id = insert_row(
        txn,
        NEGOTIATION_CARD,
        &NegotiationCardRow {
            header_id,
            problem_type_id,
            task: card.system.task.clone(),
            usage_context: card.system.usage_context.clone(),
            risks_fp: card.system.risks.fp.clone(),
            risks_fn: card.system.risks.fn_.clone(),
            risks_other: card.system.risks.other.clone(),
            dev_resources_id,
            prod_resources_id,
            integration: card.model.integration.clone(),
            input_description: card.model.input_description.clone(),
            output_description: card.model.output_description.clone(),
        },
    )?;

    for goal in &card.system.goals {
        let goal_id = insert_row(
            txn,
            NC_GOAL_DESCRIPTOR,
            &GoalRow {
                card_id,
                description: goal.description.clone(),
            },
        )?;
        for metric in &goal.metrics {
            insert_row(
                txn,
                NC_METRIC_DESCRIPTOR,
                &MetricRow {
                    goal_id,
                    description: metric.description.clone(),
                    baseline: metric.baseline.clone(),
                },
            )?;
        }
    }

    for data in &card.data {
        let classification_id =
            seed_id(txn, NC_DATA_CLASSIFICATION, data.classification.as_str())?;
        let data_id = insert_row(
            txn,
            NC_DATA_DESCRIPTOR,
            &DataRow {
                card_id,
                description: data.description.clone(),
                source: data.source.clone(),
                classification_id,
                access: data.access.clone(),
                rights: data.rights.clone(),
                policies: data.policies.clone(),
                identifiable_information: data.identifiable_information.clone(),
            },
        )?;
        for label in &data.labels {
            insert_row(
                txn,
                NC_LABEL_DESCRIPTOR,
                &LabelRow {
                    data_id,
                    description: label.description.clone(),
                    percentage: label.percentage,
                },
            )?;
        }
        for field in &data.fields {
            insert_row(
                txn,
                NC_FIELD_DESCRIPTOR,
                &FieldRow {
                    data_id,
                    name: field.name.clone(),
                    description: field.description.clone(),
                    field_type: field.field_type.clone(),
                    expected_values: field.expected_values.clone(),
                    missing_values: field.missing_values.clone(),
                    special_values: field.special_values.clone(),
                },
            )?;
        }
    }

    Ok(card_id)
}

fn card_row(
    src: &impl RowSource,
    header_id: u64,
) -> Result<(u64, NegotiationCardRow), MlgateError> {
    src.scan_where::<NegotiationCardRow>(NEGOTIATION_CARD, |row| row.header_id == header_id)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            MlgateError::Backend(format!("artifact header {header_id} has no negotiation card"))
        })
}

/// Rebuild the card stored under an artifact header.
pub(crate) fn load(src: &impl RowSource, header_id: u64) -> Result<NegotiationCard, MlgateError> {
    let (card_id, row) = card_row(src, header_id)?;

    let problem_type = seed_name(src, NC_PROBLEM_TYPE, row.problem_type_id)?.parse()?;

    let metrics = src.scan::<MetricRow>(NC_METRIC_DESCRIPTOR)?;
    let goals = src
        .scan_where::<GoalRow>(NC_GOAL_DESCRIPTOR, |g| g.card_id == card_id)?
        .into_iter()
        .map(|(goal_id, goal)| GoalDescriptor {
            description: goal.description,
            metrics: metrics
                .iter()
                .filter(|(_, m)| m.goal_id == goal_id)
                .map(|(_, m)| MetricDescriptor {
                    description: m.description.clone(),
                    baseline: m.baseline.clone(),
                })
                .collect(),
        })
        .collect();

    let labels = src.scan::<LabelRow>(NC_LABEL_DESCRIPTOR)?;
    let fields = src.scan::<FieldRow>(NC_FIELD_DESCRIPTOR)?;
    let mut data = Vec::new();
    for (data_id, d) in src.scan_where::<DataRow>(NC_DATA_DESCRIPTOR, |d| d.card_id == card_id)? {
        data.push(DataDescriptor {
            description: d.description,
            source: d.source,
            classification: seed_name(src, NC_DATA_CLASSIFICATION, d.classification_id)?
                .parse()?,
            access: d.access,
            labels: labels
                .iter()
                .filter(|(_, l)| l.data_id == data_id)
                .map(|(_, l)| LabelDescriptor {
                    description: l.description.clone(),
                    percentage: l.percentage,
                })
                .collect(),
            fields: fields
                .iter()
                .filter(|(_, f)| f.data_id == data_id)
                .map(|(_, f)| FieldDescriptor {
                    name: f.name.clone(),
                    description: f.description.clone(),
                    field_type: f.field_type.clone(),
                    expected_values: f.expected_values.clone(),
                    missing_values: f.missing_values.clone(),
                    special_values: f.special_values.clone(),
                })
                .collect(),
            rights: d.rights,
            policies: d.policies,
            identifiable_information: d.identifiable_information,
        });
    }

    let dev = src.require::<ModelResourceRow>(NC_MODEL_RESOURCE, row.dev_resources_id)?;
    let prod = src.require::<ModelResourceRow>(NC_MODEL_RESOURCE, row.prod_resources_id)?;

    Ok(NegotiationCard {
        system: SystemDescriptor {
            goals,
            problem_type,
            task: row.task,
            usage_context: row.usage_context,
            risks: RiskDescriptor {
                fp: row.risks_fp,
                fn_: row.risks_fn,
                other: row.risks_other,
            },
        },
        data,
        model: ModelDescriptor {
            development_compute_resources: resources_model(dev),
            production_compute_resources: resources_model(prod),
            integration: row.integration,
            input_description: row.input_description,
            output_description: row.output_description,
        },
    })
}

/// Remove the card row graph under an artifact header. Seeded rows stay.
pub(crate) fn delete(txn: &WriteTransaction, header_id: u64) -> Result<(), MlgateError> {
    let (card_id, row) = card_row(txn, header_id)?;

    for (goal_id, _) in delete_where::<GoalRow>(txn, NC_GOAL_DESCRIPTOR, |g| g.card_id == card_id)? {
        delete_where::<MetricRow>(txn, NC_METRIC_DESCRIPTOR, |m| m.goal_id == goal_id)?;
    }
    for (data_id, _) in delete_where::<DataRow>(txn, NC_DATA_DESCRIPTOR, |d| d.card_id == card_id)? {
        delete_where::<LabelRow>(txn, NC_LABEL_DESCRIPTOR, |l| l.data_id == data_id)?;
        delete_where::<FieldRow>(txn, NC_FIELD_DESCRIPTOR, |f| f.data_id == data_id)?;
    }
    delete_row(txn, NC_MODEL_RESOURCE, row.dev_resources_id)?;
    delete_row(txn, NC_MODEL_RESOURCE, row.prod_resources_id)?;
    delete_row(txn, NEGOTIATION_CARD, card_id)
}
